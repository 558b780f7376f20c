use std::process::Stdio;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

use crate::config::Token;

const USER_AGENT: &str = "User-Agent: git-xargs";
const API_VERSION: &str = "X-GitHub-Api-Version: 2022-11-28";

/// HTTP client using curl for making GitHub API requests
pub struct GithubCurlClient {
    token: Token,
}

/// A GitHub API response with a 4xx/5xx status.
#[derive(Debug, Error)]
#[error("GitHub API error ({status}): {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[derive(Debug, Deserialize)]
struct GitHubError {
    message: String,
}

impl GithubCurlClient {
    pub fn new(token: Token) -> Self {
        Self { token }
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<String> {
        self.request(self.command(url)).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, json_data: &str) -> Result<String> {
        let mut command = self.command(url);
        command.args([
            "-X",
            "POST",
            "-H",
            "Content-Type: application/json",
            "-d",
            json_data,
        ]);
        self.request(command).await
    }

    /// A curl invocation for `url`. The Authorization header is read from stdin
    /// (`-H @-`) so the token never appears in the process list.
    fn command(&self, url: &str) -> Command {
        let mut command = Command::new("curl");
        command
            .args(["-sS", "-w", "\n%{http_code}"])
            .args(["-H", "@-"])
            .args(["-H", "Accept: application/vnd.github+json"])
            .args(["-H", API_VERSION])
            .args(["-H", USER_AGENT])
            .arg(url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn request(&self, mut command: Command) -> Result<String> {
        let mut child = command.spawn().context("Failed to execute curl command")?;
        let mut stdin = child.stdin.take().context("curl stdin was not captured")?;

        let header = format!("Authorization: Bearer {}\n", self.token.expose());
        let write = async move { stdin.write_all(header.as_bytes()).await };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.context("Failed to execute curl command")?;
        written.context("Failed to pass headers to curl")?;

        if !output.status.success() {
            bail!(
                "curl command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        parse_response(output.stdout)
    }
}

/// Parse curl output with the status code appended on its own line.
fn parse_response(stdout: Vec<u8>) -> Result<String> {
    let output_str = String::from_utf8(stdout)?;
    let (response, status_code) = match output_str.rsplit_once('\n') {
        Some((body, code)) => (body, code.trim().parse::<u16>().unwrap_or(0)),
        None => ("", output_str.trim().parse::<u16>().unwrap_or(0)),
    };

    if status_code == 0 {
        bail!("GitHub API request returned no status code");
    }

    if status_code >= 400 {
        let message = serde_json::from_str::<GitHubError>(response)
            .map(|error| error.message)
            .unwrap_or_else(|_| response.trim().to_string());
        return Err(HttpError {
            status: status_code,
            message,
        }
        .into());
    }

    Ok(response.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_not_an_argument() {
        let client = GithubCurlClient::new(Token::new("ghp_secret"));
        let command = client.command("https://api.github.com/orgs/acme/repos");

        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(args.iter().all(|arg| !arg.contains("ghp_secret")));
        assert!(args.windows(2).any(|pair| pair == ["-H", "@-"]));
    }

    #[test]
    fn test_parse_success() {
        let body = parse_response(b"{\"name\":\"repo\"}\n200".to_vec()).unwrap();
        assert_eq!(body, "{\"name\":\"repo\"}");
    }

    #[test]
    fn test_parse_not_found() {
        let err = parse_response(b"{\"message\":\"Not Found\"}\n404".to_vec()).unwrap_err();
        let http = err.downcast_ref::<HttpError>().unwrap();
        assert!(http.is_not_found());
        assert_eq!(http.message, "Not Found");
        assert_eq!(err.to_string(), "GitHub API error (404): Not Found");
    }

    #[test]
    fn test_parse_error_without_json() {
        let err = parse_response(b"bad gateway\n502".to_vec()).unwrap_err();
        let http = err.downcast_ref::<HttpError>().unwrap();
        assert_eq!(http.status, 502);
        assert_eq!(http.message, "bad gateway");
    }

    #[test]
    fn test_parse_missing_status() {
        assert!(parse_response(b"garbage".to_vec()).is_err());
    }
}
