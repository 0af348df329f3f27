//! Fetch command - send one request through the cache layer

use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::dispatch::Interception;
use crate::error::{RelayError, RelayResult};
use crate::fetch::{RequestDescriptor, RequestMode, Response};
use crate::worker::Worker;
use console::style;
use std::io::Write;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> RelayResult<()> {
    let request = build_request(&args)?;
    let worker = Worker::from_config(config.clone())?;

    let response = match worker.fetch(&request).await {
        Interception::Respond(response) => response,
        Interception::Declined => {
            return Err(RelayError::User(format!(
                "{} is not handled by the cache layer",
                request.url
            )))
        }
    };

    // Late writes (abandoned team-image fetches, pre-warm) finish before exit
    let drained = worker.wait_until_idle().await;
    if drained > 0 {
        debug!("Waited for {} background task(s)", drained);
    }

    if args.include {
        print_head(&response);
    }

    match args.output {
        Some(path) => tokio::fs::write(&path, &response.body)
            .await
            .map_err(|e| RelayError::io(format!("writing {}", path.display()), e))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| RelayError::io("writing response body", e))?;
        }
    }

    Ok(())
}

fn build_request(args: &FetchArgs) -> RelayResult<RequestDescriptor> {
    let mut request = RequestDescriptor::parse(&args.method, &args.url)?;

    if args.navigate {
        request = request
            .with_mode(RequestMode::Navigate)
            .with_header("accept", "text/html,application/xhtml+xml");
    }
    if let Some(accept) = &args.accept {
        request = request.with_header("accept", accept);
    }
    for (name, value) in &args.headers {
        request = request.with_header(name, value);
    }

    Ok(request)
}

fn print_head(response: &Response) {
    let status = if (200..300).contains(&response.status) {
        style(response.status).green()
    } else {
        style(response.status).red()
    };
    println!("{} {}", status, style(&response.source).dim());
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
}
