//! Request bodies of the servers API and their boundary validation.

use crate::core::{NewServer, ServerState, ServerUpdate};
use crate::error::ApiError;
use serde::Deserialize;
use std::net::IpAddr;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CreateServerRequest {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<String>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<i64>,
    pub uptime: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateServerRequest {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<String>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<i64>,
    pub uptime: Option<i64>,
}

impl CreateServerRequest {
    pub fn validate(self) -> Result<NewServer, ApiError> {
        let hostname = hostname(self.hostname.ok_or_else(|| missing("hostname"))?)?;
        let ip_address = ip_address(self.ip_address.ok_or_else(|| missing("ip_address"))?)?;
        let status = match self.status {
            Some(raw) => status(&raw)?,
            None => ServerState::Running,
        };
        Ok(NewServer {
            hostname,
            ip_address,
            status,
            cpu_usage: cpu_usage(self.cpu_usage.unwrap_or(0.0))?,
            memory_usage: memory_usage(self.memory_usage.unwrap_or(0))?,
            uptime: uptime(self.uptime.unwrap_or(0))?,
        })
    }
}

impl UpdateServerRequest {
    /// Validates only the fields that are present.
    pub fn validate(self) -> Result<ServerUpdate, ApiError> {
        Ok(ServerUpdate {
            hostname: self.hostname.map(hostname).transpose()?,
            ip_address: self.ip_address.map(ip_address).transpose()?,
            status: self.status.as_deref().map(status).transpose()?,
            cpu_usage: self.cpu_usage.map(cpu_usage).transpose()?,
            memory_usage: self.memory_usage.map(memory_usage).transpose()?,
            uptime: self.uptime.map(uptime).transpose()?,
        })
    }
}

fn missing(field: &str) -> ApiError {
    ApiError::Validation(format!("Missing required field: {field}"))
}

fn hostname(value: String) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(missing("hostname"));
    }
    Ok(trimmed.to_string())
}

fn ip_address(value: String) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(missing("ip_address"));
    }
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| ApiError::Validation(format!("Invalid ip_address: {trimmed}")))?;
    Ok(trimmed.to_string())
}

fn status(value: &str) -> Result<ServerState, ApiError> {
    value
        .parse::<ServerState>()
        .map_err(|e| ApiError::Validation(format!("Invalid status value: {e}")))
}

fn cpu_usage(value: f64) -> Result<f64, ApiError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ApiError::Validation("cpu_usage out of range (0-100)".to_string()));
    }
    Ok(value)
}

fn memory_usage(value: i64) -> Result<i64, ApiError> {
    if value < 0 {
        return Err(ApiError::Validation("memory_usage must not be negative".to_string()));
    }
    Ok(value)
}

fn uptime(value: i64) -> Result<i64, ApiError> {
    if value < 0 {
        return Err(ApiError::Validation("uptime must not be negative".to_string()));
    }
    Ok(value)
}
