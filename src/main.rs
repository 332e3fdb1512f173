use std::str::FromStr;
use std::time::Duration;

use a2squery::error::SourceQueryError;
use a2squery::{FailureKind, InfoReply, PlayerList, ServerInfo};
use clap::Parser;
use serde::Serialize;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(name = "a2squery")]
#[command(about = "Query Source engine servers and print their status as JSON lines")]
struct Cli {
    /// Servers to query, as host:port
    #[arg(required = true)]
    targets: Vec<Target>,

    /// Deadline for each query, in milliseconds
    #[arg(short, long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Also fetch the player list
    #[arg(short, long)]
    players: bool,

    /// Send a single A2S_INFO and report a challenge instead of answering it
    #[arg(long)]
    no_challenge: bool,

    /// Poll every SECS seconds instead of querying once
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    watch: Option<u64>,
}

#[derive(Debug, Clone)]
struct Target {
    host: String,
    port: u16,
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got {s:?}"))?;
        if host.is_empty() {
            return Err(format!("missing host in {s:?}"));
        }
        let port: u16 = port.parse().map_err(|_| format!("invalid port in {s:?}"))?;
        Ok(Target {
            host: host.to_owned(),
            port,
        })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Status {
    Online {
        target: String,
        info: ServerInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        players: Option<PlayerList>,
        /// Set when the player query failed but the info query did not.
        #[serde(skip_serializing_if = "Option::is_none")]
        players_error: Option<PlayerFailure>,
    },
    Challenged {
        target: String,
        challenge: i32,
    },
    Offline {
        target: String,
        failure: FailureKind,
        error: String,
    },
}

#[derive(Serialize)]
struct PlayerFailure {
    failure: FailureKind,
    error: String,
}

#[derive(Debug, Clone, Copy)]
struct Options {
    timeout: Duration,
    players: bool,
    no_challenge: bool,
}

async fn fetch(target: &Target, opts: Options) -> Result<Status, SourceQueryError> {
    let info: ServerInfo = if opts.no_challenge {
        match a2squery::query_info(&target.host, target.port, Some(opts.timeout)).await? {
            InfoReply::Info(info) => info,
            InfoReply::Challenge(token) => {
                return Ok(Status::Challenged {
                    target: target.to_string(),
                    challenge: token.value(),
                })
            }
        }
    } else {
        a2squery::query_info_with_challenge(&target.host, target.port, Some(opts.timeout)).await?
    };

    let (players, players_error) = if opts.players {
        let result = a2squery::query_players(&target.host, target.port, Some(opts.timeout)).await;
        if let Err(e) = &result {
            log::warn!("{} answered info but not players: {}", target, e);
        }
        split_players(result)
    } else {
        (None, None)
    };

    Ok(Status::Online {
        target: target.to_string(),
        info,
        players,
        players_error,
    })
}

/// A failed player query still leaves the server online.
fn split_players(result: Result<PlayerList, SourceQueryError>) -> (Option<PlayerList>, Option<PlayerFailure>) {
    match result {
        Ok(players) => (Some(players), None),
        Err(e) => (
            None,
            Some(PlayerFailure {
                failure: e.kind(),
                error: e.to_string(),
            }),
        ),
    }
}

async fn status(target: Target, opts: Options) -> Status {
    fetch(&target, opts).await.unwrap_or_else(|e| {
        log::warn!("{} is offline: {}", target, e);
        Status::Offline {
            target: target.to_string(),
            failure: e.kind(),
            error: e.to_string(),
        }
    })
}

async fn poll(targets: &[Target], opts: Options) {
    let mut set: JoinSet<Status> = JoinSet::new();
    for target in targets {
        set.spawn(status(target.clone(), opts));
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(status) => match serde_json::to_string(&status) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("failed to render status: {}", e),
            },
            Err(e) => log::error!("query task failed: {}", e),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let opts = Options {
        timeout: Duration::from_millis(cli.timeout_ms),
        players: cli.players,
        no_challenge: cli.no_challenge,
    };

    match cli.watch {
        Some(secs) => {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                log::info!("polling {} servers", cli.targets.len());
                poll(&cli.targets, opts).await;
            }
        }
        None => poll(&cli.targets, opts).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_target() {
        let target: Target = "play.example.com:27015".parse().unwrap();
        assert_eq!(target.host, "play.example.com");
        assert_eq!(target.port, 27015);
        assert_eq!(target.to_string(), "play.example.com:27015");
    }

    #[test]
    fn rejects_bad_targets() {
        assert!("play.example.com".parse::<Target>().is_err());
        assert!(":27015".parse::<Target>().is_err());
        assert!("host:99999".parse::<Target>().is_err());
    }

    fn info() -> ServerInfo {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, b'I', 17];
        data.extend_from_slice(b"Srv\0de_test\0csgo\0Counter-Strike\0");
        data.extend_from_slice(&240u16.to_le_bytes());
        data.extend_from_slice(&[5, 10, 0, b'd', b'l', 0, 1]);
        data.extend_from_slice(b"1.0\0");
        ServerInfo::parse(&data).unwrap()
    }

    #[test]
    fn failed_player_query_keeps_server_online() {
        let err = SourceQueryError::UnexpectedChallenge;
        let (players, players_error) = split_players(Err(err));
        let status = Status::Online {
            target: "10.0.0.1:27015".into(),
            info: info(),
            players,
            players_error,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "online");
        assert_eq!(json["info"]["name"], "Srv");
        assert!(json.get("players").is_none());
        assert_eq!(json["players_error"]["failure"], "protocol");
    }

    #[test]
    fn player_list_renders_without_error() {
        let (players, players_error) = split_players(Ok(PlayerList::default()));
        let status = Status::Online {
            target: "10.0.0.1:27015".into(),
            info: info(),
            players,
            players_error,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["players"], serde_json::json!([]));
        assert!(json.get("players_error").is_none());
    }

    #[test]
    fn watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["a2squery", "--watch", "0", "127.0.0.1:27015"]).is_err());
        let cli = Cli::try_parse_from(["a2squery", "--watch", "30", "127.0.0.1:27015"]).unwrap();
        assert_eq!(cli.watch, Some(30));
    }

    #[test]
    fn offline_status_renders_failure_kind() {
        let status = Status::Offline {
            target: "10.0.0.1:27015".into(),
            failure: FailureKind::Timeout,
            error: "query timed out".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["failure"], "timeout");
    }
}
