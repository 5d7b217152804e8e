use crate::config::GrabConfig;
use crate::normalize::redact_url_for_log;
use crate::{EngineError, Result};
use std::io::Read;
use std::time::Duration;

pub fn build_agent(user_agent: &str, timeout_secs: u64) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder();
    config = config
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
        .user_agent(user_agent);
    config.build().into()
}

pub fn page_agent(config: &GrabConfig) -> ureq::Agent {
    build_agent(&config.user_agent, config.page_timeout_secs)
}

pub fn image_agent(config: &GrabConfig) -> ureq::Agent {
    build_agent(&config.user_agent, config.image_timeout_secs)
}

pub fn fetch_html(agent: &ureq::Agent, url: &str) -> Result<String> {
    let unreachable = |reason: String| EngineError::PageUnreachable {
        url: redact_url_for_log(url),
        reason,
    };

    let mut response = agent.get(url).call().map_err(|e| unreachable(e.to_string()))?;
    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(unreachable(format!("status={status}")));
    }

    let mut html_buf = Vec::new();
    response
        .body_mut()
        .as_reader()
        .read_to_end(&mut html_buf)
        .map_err(|e| unreachable(e.to_string()))?;
    Ok(String::from_utf8_lossy(&html_buf).into_owned())
}

pub(crate) fn header_string(response: &ureq::http::Response<ureq::Body>, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}
