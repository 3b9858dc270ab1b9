use crate::remote::{
    RemoteCoordinator, RemoteError, SlotEventBody, VehicleClass, parse_approval,
    parse_entry_assignment, parse_exit_code,
};
use crate::state::{EntryAssignment, SlotEvent};
use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const POST_EVENT_PATH: &str = "/post";
pub const ENTRY_TWO_WHEELER_PATH: &str = "/get_entry_2";
pub const ENTRY_FOUR_WHEELER_PATH: &str = "/get_entry_4";
pub const EXIT_PIN_PATH: &str = "/get_exit_pin";
pub const EXIT_APPROVED_PATH: &str = "/get_exit_approved";

/// Blocking HTTP/1.1 client for the coordination service.
pub struct HttpCoordinator {
    base: ParsedUrl,
    timeout: Duration,
    link_up: bool,
}

impl HttpCoordinator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            base: parse_http_url(base_url)?,
            timeout,
            link_up: true,
        })
    }

    fn url_for(&self, path: &str) -> ParsedUrl {
        let prefix = self.base.path.trim_end_matches('/');
        ParsedUrl {
            host: self.base.host.clone(),
            port: self.base.port,
            path: format!("{prefix}{path}"),
        }
    }

    fn call(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<HttpResponse, RemoteError> {
        let url = self.url_for(path);
        let result = send_http(method, &url, body, self.timeout);
        if let Err(err) = &result
            && err.is_link_loss()
            && self.link_up
        {
            warn!(host = %url.host, error = %err, "Coordination service unreachable, link marked down");
            self.link_up = false;
        }
        let response = result?;
        if response.status >= 400 {
            return Err(RemoteError::Http(response.status, response.body.trim().to_string()));
        }
        Ok(response)
    }
}

impl fmt::Debug for HttpCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCoordinator")
            .field("host", &self.base.host)
            .field("port", &self.base.port)
            .field("timeout", &self.timeout)
            .field("link_up", &self.link_up)
            .finish()
    }
}

impl RemoteCoordinator for HttpCoordinator {
    fn notify_slot_event(&mut self, event: SlotEvent) -> Result<u16, RemoteError> {
        let payload = serde_json::to_string(&SlotEventBody::from(event))?;
        let response = self.call(Method::Post, POST_EVENT_PATH, Some(&payload))?;
        Ok(response.status)
    }

    fn request_entry_assignment(
        &mut self,
        class: VehicleClass,
    ) -> Result<EntryAssignment, RemoteError> {
        let path = match class {
            VehicleClass::TwoWheeler => ENTRY_TWO_WHEELER_PATH,
            VehicleClass::FourWheeler => ENTRY_FOUR_WHEELER_PATH,
        };
        let response = self.call(Method::Get, path, None)?;
        debug!(body = %response.body, "Entry assignment payload");
        parse_entry_assignment(&response.body)
    }

    fn request_exit_code(&mut self) -> Result<String, RemoteError> {
        let response = self.call(Method::Get, EXIT_PIN_PATH, None)?;
        parse_exit_code(&response.body)
    }

    fn poll_exit_approval(&mut self) -> Result<bool, RemoteError> {
        let response = self.call(Method::Get, EXIT_APPROVED_PATH, None)?;
        parse_approval(&response.body)
    }

    fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn reconnect(&mut self) -> bool {
        match resolve(&self.base).and_then(|addr| {
            TcpStream::connect_timeout(&addr, self.timeout).map_err(RemoteError::Connect)
        }) {
            Ok(_) => {
                info!(host = %self.base.host, port = self.base.port, "Coordination service reachable again");
                self.link_up = true;
            }
            Err(err) => {
                debug!(host = %self.base.host, error = %err, "Reconnect attempt failed");
            }
        }
        self.link_up
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug)]
struct HttpResponse {
    status: u16,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, RemoteError> {
    let invalid = |reason: &str| RemoteError::InvalidUrl(format!("{reason}: {endpoint}"));
    let rest = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| invalid("only http:// supported"))?;

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{path}")),
        None => (rest, "/".to_string()),
    };
    let (host, port) = match authority.split_once(':') {
        Some((host, "")) => (host, 80),
        Some((host, port)) => (host, port.parse().map_err(|_| invalid("invalid port"))?),
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

fn resolve(url: &ParsedUrl) -> Result<SocketAddr, RemoteError> {
    (url.host.as_str(), url.port)
        .to_socket_addrs()
        .map_err(|err| RemoteError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| RemoteError::Dns("no addresses resolved".to_string()))
}

fn send_http(
    method: Method,
    url: &ParsedUrl,
    body: Option<&str>,
    timeout: Duration,
) -> Result<HttpResponse, RemoteError> {
    let addr = resolve(url)?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(RemoteError::Connect)?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;

    let body = body.unwrap_or("");
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method.as_str(),
        url.path,
        url.host,
        body.len(),
        body
    );

    stream
        .write_all(request.as_bytes())
        .map_err(RemoteError::Io)?;

    let mut response = String::new();
    stream.read_to_string(&mut response).map_err(RemoteError::Io)?;

    parse_response(&response)
}

fn parse_response(raw: &str) -> Result<HttpResponse, RemoteError> {
    let malformed = |reason: &str| RemoteError::Malformed(reason.to_string());
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| malformed("no header terminator"))?;

    // "HTTP/1.1 200 OK"
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| malformed("bad status line"))?;

    Ok(HttpResponse {
        status,
        body: body.to_string(),
    })
}
