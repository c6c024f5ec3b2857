//! reducer-post: send source files to a reducer server and print the result.
//!
//! Files are posted as urlencoded form fields `file1`, `file2`, ... by
//! default, or as multipart file uploads with `--upload`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reducer_client::Transform;
use reqwest::multipart;

/// Post source files to a reducer server.
#[derive(Parser, Debug)]
#[command(name = "reducer-post", version, about = "Minify files through a reducer server")]
struct Cli {
    /// Files to send, aggregated in the order given.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Transformation to run: css, js or less.
    #[arg(short, long, default_value = "js")]
    kind: Transform,

    /// Server base URL.
    #[arg(short, long, env = "REDUCER_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Response lifetime in seconds (0 disables cache headers).
    #[arg(long)]
    max_age: Option<u64>,

    /// Remote fetch cache lifetime in seconds (0 disables it).
    #[arg(long)]
    expire_urls: Option<u64>,

    /// Bypass the server's caches.
    #[arg(long)]
    no_cache: bool,

    /// Send files as multipart uploads instead of form fields.
    #[arg(long)]
    upload: bool,
}

impl Cli {
    fn endpoint(&self) -> String {
        format!("{}{}", self.server.trim_end_matches('/'), self.kind.path())
    }

    fn control_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(max_age) = self.max_age {
            params.push(("max-age", max_age.to_string()));
        }
        if let Some(expire_urls) = self.expire_urls {
            params.push(("expire_urls", expire_urls.to_string()));
        }
        params
    }
}

/// Field names the server will sort back into argument order.
///
/// Names are zero-padded once there are more than nine files, since the
/// server orders parameters by plain string comparison.
fn field_names(count: usize) -> Vec<String> {
    let width = count.to_string().len();
    (1..=count).map(|i| format!("file{i:0width$}")).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut sources = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let bytes = tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))?;
        sources.push((path, bytes));
    }

    let client = reqwest::Client::new();
    let mut request = client.post(cli.endpoint()).query(&cli.control_params());
    if cli.no_cache {
        request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
    }

    let names = field_names(sources.len());
    request = if cli.upload {
        let mut form = multipart::Form::new();
        for (name, (path, bytes)) in names.into_iter().zip(sources) {
            let file_name = path.file_name().map_or_else(|| name.clone(), |n| n.to_string_lossy().into_owned());
            form = form.part(name, multipart::Part::bytes(bytes).file_name(file_name));
        }
        request.multipart(form)
    } else {
        let fields: Vec<(String, String)> = names
            .into_iter()
            .zip(sources)
            .map(|(name, (_, bytes))| (name, String::from_utf8_lossy(&bytes).into_owned()))
            .collect();
        request.form(&fields)
    };

    let response = request.send().await.with_context(|| format!("posting to {}", cli.endpoint()))?;
    println!("{}", response.status());
    println!("{}", response.text().await?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_sort_in_argument_order() {
        assert_eq!(field_names(1), ["file1"]);
        let mut names = field_names(12);
        assert_eq!(names[0], "file01");
        let expected = names.clone();
        names.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "reducer-post",
            "--kind",
            "css",
            "--server",
            "http://example.com:9000/",
            "--max-age",
            "0",
            "--no-cache",
            "a.css",
            "b.css",
        ])
        .unwrap();

        assert_eq!(cli.endpoint(), "http://example.com:9000/css");
        assert_eq!(cli.control_params(), [("max-age", "0".to_string())]);
        assert!(cli.no_cache);
        assert!(!cli.upload);
        assert_eq!(cli.files.len(), 2);
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["reducer-post"]).is_err());
    }
}
