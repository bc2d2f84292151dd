//! 配置校验模块
//!
//! 校验规则：
//! - max_batch_size > 0, 0 < interval_ms <= MAX_INTERVAL_MS
//! - max_buffered_records (if set) >= max_batch_size
//! - sink names non-empty and unique
//! - network sinks carry a parseable `addr`
//! - server.bind_addr is a socket address, max_body_bytes > 0

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, GatewayBlueprint, SinkType};

/// Longest accepted window interval in milliseconds (one year, the engine's bound)
pub const MAX_INTERVAL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// 校验 GatewayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
    validate_window(blueprint)?;
    validate_sink_names(blueprint)?;
    validate_sink_params(blueprint)?;
    validate_server(blueprint)?;
    Ok(())
}

fn validate_window(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
    let window = &blueprint.window;

    if window.max_batch_size <= 0 {
        return Err(ContractError::config_validation(
            "window.max_batch_size",
            format!("max_batch_size must be > 0, got {}", window.max_batch_size),
        ));
    }

    if window.interval_ms <= 0 {
        return Err(ContractError::config_validation(
            "window.interval_ms",
            format!("interval_ms must be > 0, got {}", window.interval_ms),
        ));
    }

    if window.interval_ms > MAX_INTERVAL_MS {
        return Err(ContractError::config_validation(
            "window.interval_ms",
            format!(
                "interval_ms must be <= {MAX_INTERVAL_MS}, got {}",
                window.interval_ms
            ),
        ));
    }

    if let Some(cap) = window.max_buffered_records {
        // max_batch_size is positive here
        if cap < window.max_batch_size as u64 {
            return Err(ContractError::config_validation(
                "window.max_buffered_records",
                format!(
                    "max_buffered_records ({}) must be >= max_batch_size ({})",
                    cap, window.max_batch_size
                ),
            ));
        }
    }

    Ok(())
}

fn validate_sink_names(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

fn validate_sink_params(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
    for sink in &blueprint.sinks {
        if sink.sink_type != SinkType::Network {
            continue;
        }

        let field = format!("sinks[{}].params.addr", sink.name);
        let addr = sink
            .params
            .get("addr")
            .ok_or_else(|| ContractError::config_validation(&field, "network sink requires 'addr'"))?;

        addr.parse::<SocketAddr>().map_err(|e| {
            ContractError::config_validation(&field, format!("invalid address '{}': {}", addr, e))
        })?;
    }
    Ok(())
}

fn validate_server(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
    let server = &blueprint.server;

    server.bind_addr.parse::<SocketAddr>().map_err(|e| {
        ContractError::config_validation(
            "server.bind_addr",
            format!("invalid address '{}': {}", server.bind_addr, e),
        )
    })?;

    if server.max_body_bytes == 0 {
        return Err(ContractError::config_validation(
            "server.max_body_bytes",
            "max_body_bytes must be > 0",
        ));
    }

    Ok(())
}
