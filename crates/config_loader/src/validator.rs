//! 配置校验模块
//!
//! 校验规则：
//! - 至少配置一个目的地
//! - 目的地名称非空
//! - 目的地 URL 为绝对 http/https 地址
//! - 监听端口 != 0
//! - flush_interval_secs > 0
//! - fallback 策略下 fallback_destination 必须存在

use contracts::{ContractError, RelayBlueprint, UnknownDestinationPolicy};
use url::Url;

/// 校验 RelayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_server(blueprint)?;
    validate_destinations(blueprint)?;
    validate_dispatch(blueprint)?;
    Ok(())
}

/// 校验监听配置
fn validate_server(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.server.port == 0 {
        return Err(ContractError::config_validation(
            "server.port",
            "port must be > 0",
        ));
    }
    if blueprint.server.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "server.host",
            "host cannot be empty",
        ));
    }
    if blueprint.server.max_body_bytes == 0 {
        return Err(ContractError::config_validation(
            "server.max_body_bytes",
            "max_body_bytes must be > 0",
        ));
    }
    Ok(())
}

/// 校验目的地路由表
fn validate_destinations(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.destinations.is_empty() {
        return Err(ContractError::config_validation(
            "destinations",
            "at least one destination must be configured",
        ));
    }

    for (name, url) in &blueprint.destinations {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "destinations",
                "destination name cannot be empty",
            ));
        }

        let parsed = Url::parse(url).map_err(|e| {
            ContractError::config_validation(
                format!("destinations.{name}"),
                format!("invalid url '{url}': {e}"),
            )
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ContractError::config_validation(
                format!("destinations.{name}"),
                format!("unsupported scheme '{}', expected http or https", parsed.scheme()),
            ));
        }
    }
    Ok(())
}

/// 校验分发配置
fn validate_dispatch(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let dispatch = &blueprint.dispatch;

    if dispatch.flush_interval_secs == 0 {
        return Err(ContractError::config_validation(
            "dispatch.flush_interval_secs",
            "flush_interval_secs must be > 0",
        ));
    }

    if dispatch.unknown_destination == UnknownDestinationPolicy::Fallback
        && !blueprint
            .destinations
            .contains_key(&dispatch.fallback_destination)
    {
        return Err(ContractError::config_validation(
            "dispatch.fallback_destination",
            format!(
                "fallback_destination '{}' not found in destinations",
                dispatch.fallback_destination
            ),
        ));
    }

    Ok(())
}
