use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::Value;
use std::time::Duration;

use crate::cli::utils::{output_error, output_value, parse_params};
use crate::cli::OutputFormat;
use crate::services::ExecuteRequest;

#[derive(Args, Clone)]
pub struct ServerArgs {
    #[arg(long, env = "CAMPUS_SERVER", default_value = "http://localhost:3000", help = "API base URL")]
    pub server: String,

    #[arg(long, env = "CAMPUS_TOKEN", help = "Bearer token (see `campus auth token`)")]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum QueryCommands {
    #[command(about = "List stored queries")]
    List {
        #[command(flatten)]
        server: ServerArgs,
        #[arg(long, help = "Only this category")]
        category: Option<String>,
        #[arg(long, help = "Only this tag")]
        tag: Option<String>,
        #[arg(long, help = "Include deactivated queries")]
        all: bool,
    },

    #[command(about = "Show one stored query")]
    Show {
        #[command(flatten)]
        server: ServerArgs,
        #[arg(help = "Query name")]
        name: String,
    },

    #[command(about = "Execute a stored query")]
    Execute {
        #[command(flatten)]
        server: ServerArgs,
        #[arg(help = "Query name")]
        name: String,
        #[arg(long, help = "Parameters as a JSON object")]
        params: Option<String>,
        #[arg(long, help = "Result limit")]
        limit: Option<i32>,
        #[arg(long, help = "Result offset")]
        offset: Option<i32>,
    },
}

pub async fn handle(cmd: QueryCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        QueryCommands::List { server, category, tag, all } => {
            let client = ApiClient::new(server)?;
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(category) = category {
                query.push(("category", category));
            }
            if let Some(tag) = tag {
                query.push(("tag", tag));
            }
            if all {
                query.push(("include_inactive", "true".to_string()));
            }
            let data = client.send(client.get("/api/queries").query(&query), &output_format).await?;
            match output_format {
                OutputFormat::Json => output_value(&output_format, &data),
                OutputFormat::Text => {
                    for template in data.as_array().into_iter().flatten() {
                        println!(
                            "{:<32} {:<14} {:<8} runs={}",
                            template["name"].as_str().unwrap_or_default(),
                            template["collection"].as_str().unwrap_or_default(),
                            template["category"].as_str().unwrap_or_default(),
                            template["executionCount"]
                        );
                    }
                    Ok(())
                }
            }
        }
        QueryCommands::Show { server, name } => {
            let client = ApiClient::new(server)?;
            let data = client
                .send(client.get(&format!("/api/queries/{}", name)), &output_format)
                .await?;
            output_value(&output_format, &data)
        }
        QueryCommands::Execute { server, name, params, limit, offset } => {
            let client = ApiClient::new(server)?;
            let request = ExecuteRequest {
                query_name: name,
                parameters: parse_params(params.as_deref())?,
                limit,
                offset,
                order: None,
            };
            let data = client
                .send(client.post("/api/queries/execute").json(&request), &output_format)
                .await?;
            output_value(&output_format, &data)
        }
    }
}

struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    fn new(args: ServerArgs) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base: args.server.trim_end_matches('/').to_string(),
            token: args.token,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(format!("{}{}", self.base, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(format!("{}{}", self.base, path)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and unwrap the `data` of a success envelope
    async fn send(&self, request: reqwest::RequestBuilder, output_format: &OutputFormat) -> anyhow::Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base))?;
        let status = response.status();
        let body: Value = response.json().await.context("server returned a non-JSON body")?;

        if status.is_success() {
            return Ok(body.get("data").cloned().unwrap_or(Value::Null));
        }

        let message = body["message"].as_str().unwrap_or("request failed").to_string();
        let details: Vec<String> = body["errors"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|e| e.as_str().map(str::to_string))
            .collect();
        output_error(output_format, &message, &details)?;
        Err(anyhow::anyhow!("{} ({})", body["code"].as_str().unwrap_or("ERROR"), status))
    }
}

