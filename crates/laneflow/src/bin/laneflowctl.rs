use reqwest::{Client, Method, Response};
use serde_json::{json, Value};
use std::env;

const USAGE: &str = "laneflowctl <command>\n\
Commands:\n\
- status\n\
- job <video|qa> <id>\n\
- explain <video|qa> <id>\n\
- video <url> <company> [priority]\n\
- ask <company> <interaction_id> <question...>\n\
- cancel <video|qa> <id>\n\
- clear-dedup [resource_key]\n\
\n\
Talks to the admin API at LANEFLOW_ADMIN_URL (default http://127.0.0.1:8080).\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprint!("{USAGE}");
        std::process::exit(2);
    }

    let base = env::var("LANEFLOW_ADMIN_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let ctl = Ctl {
        base: base.trim_end_matches('/').to_string(),
        client: Client::new(),
    };

    match args[1].as_str() {
        "status" => ctl.call(Method::GET, "/queue/status", None).await?,
        "job" => {
            let (lane, id) = lane_and_id(&args)?;
            ctl.call(Method::GET, &format!("/jobs/{lane}/{id}"), None).await?
        }
        "explain" => {
            let (lane, id) = lane_and_id(&args)?;
            ctl.call(Method::GET, &format!("/jobs/{lane}/{id}/explain"), None)
                .await?
        }
        "cancel" => {
            let (lane, id) = lane_and_id(&args)?;
            ctl.call(Method::DELETE, &format!("/jobs/{lane}/{id}"), None)
                .await?
        }
        "video" => {
            let (Some(url), Some(company)) = (args.get(2), args.get(3)) else {
                anyhow::bail!("usage: laneflowctl video <url> <company> [priority]");
            };
            let priority: Option<u8> = match args.get(4) {
                Some(p) => Some(p.parse()?),
                None => None,
            };
            let body = json!({
                "video_url": url,
                "company_name": company,
                "is_youtube": url.contains("youtube.com") || url.contains("youtu.be"),
                "priority": priority,
            });
            ctl.call(Method::POST, "/jobs/video", Some(body)).await?
        }
        "ask" => {
            if args.len() < 5 {
                anyhow::bail!("usage: laneflowctl ask <company> <interaction_id> <question...>");
            }
            let body = json!({
                "company_name": args[2],
                "interaction_id": args[3],
                "question": args[4..].join(" "),
            });
            ctl.call(Method::POST, "/jobs/qa", Some(body)).await?
        }
        "clear-dedup" => {
            let body = json!({ "resource_key": args.get(2) });
            ctl.call(Method::POST, "/dedup/clear", Some(body)).await?
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

struct Ctl {
    base: String,
    client: Client,
}

impl Ctl {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<()> {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        print_response(req.send().await?).await
    }
}

fn lane_and_id(args: &[String]) -> anyhow::Result<(String, u64)> {
    let (Some(lane), Some(id)) = (args.get(2), args.get(3)) else {
        anyhow::bail!("usage: laneflowctl {} <video|qa> <id>", args[1]);
    };
    Ok((lane.to_lowercase(), id.parse()?))
}

async fn print_response(resp: Response) -> anyhow::Result<()> {
    let status = resp.status();
    let text = resp.text().await?;

    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{pretty}");
        Ok(())
    } else {
        anyhow::bail!("{status}: {pretty}")
    }
}
