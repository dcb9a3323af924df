//! Service labels for open ports.
//!
//! No protocol detection happens here: the label is rendered from the
//! connected peer address and a template.

use std::net::SocketAddr;

/// Builds the `uri` reported for an open port.
pub trait LabelFormatter: Send + Sync {
    fn format(&self, peer: SocketAddr) -> String;
}

/// Renders `{ip}`, `{port}` and `{scheme}` placeholders into a fixed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLabel {
    template: String,
}

impl TemplateLabel {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for TemplateLabel {
    fn default() -> Self {
        Self::new("telnet://{ip}:{port}")
    }
}

impl LabelFormatter for TemplateLabel {
    fn format(&self, peer: SocketAddr) -> String {
        self.template
            .replace("{scheme}", scheme_for_port(peer.port()))
            .replace("{ip}", &peer.ip().to_string())
            .replace("{port}", &peer.port().to_string())
    }
}

/// Best-guess URI scheme from well-known port numbers.
pub fn scheme_for_port(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 | 587 => "smtp",
        53 => "dns",
        80 | 8000 | 8080 => "http",
        110 => "pop3",
        143 => "imap",
        443 | 8443 => "https",
        445 => "smb",
        3306 => "mysql",
        3389 => "rdp",
        5432 => "postgres",
        5900 => "vnc",
        6379 => "redis",
        _ => "tcp",
    }
}
