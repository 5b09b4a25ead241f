use regex::Regex;
use url::Url;

use crate::error::ScrapeError;

/// A resolved attachment download: the GET target plus an optional file
/// name the portal supplied alongside the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub file_name: Option<String>,
}

/// Maps a portal attachment handler to a `DownloadRequest`.
///
/// Two handler shapes are supported:
/// `downLoadBbs(a,b,c,d)` becomes
/// `GET {base}/bbsDownload.do?brdScnBltNo=a&brdBltNo=b&type=c&atchSeq=d`,
/// and `goDown1('/share/attach/x','name.hwp')` resolves the path against
/// the portal base. Anything else is `UnsupportedHandler`.
pub fn parse_handler(handler: &str, base_url: &str) -> Result<DownloadRequest, ScrapeError> {
    let handler = handler.trim().trim_start_matches("javascript:").trim();

    let down_load_bbs = Regex::new(r"downLoadBbs\s*\(([^)]*)\)").unwrap();
    if let Some(caps) = down_load_bbs.captures(handler) {
        let args = split_args(&caps[1]);
        if args.len() != 4 {
            return Err(ScrapeError::UnsupportedHandler(truncate(handler)));
        }
        let mut url = Url::parse(base_url)?;
        url.set_path("/bbsDownload.do");
        url.query_pairs_mut()
            .append_pair("brdScnBltNo", &args[0])
            .append_pair("brdBltNo", &args[1])
            .append_pair("type", &args[2])
            .append_pair("atchSeq", &args[3]);
        return Ok(DownloadRequest {
            url: url.to_string(),
            file_name: None,
        });
    }

    let go_down = Regex::new(r"goDown1\s*\(([^)]*)\)").unwrap();
    if let Some(caps) = go_down.captures(handler) {
        let args = split_args(&caps[1]);
        if args.len() != 2 {
            return Err(ScrapeError::UnsupportedHandler(truncate(handler)));
        }
        let url = Url::parse(base_url)?.join(&args[0])?;
        return Ok(DownloadRequest {
            url: url.to_string(),
            file_name: Some(args[1].clone()),
        });
    }

    Err(ScrapeError::UnsupportedHandler(truncate(handler)))
}

/// Comma-split of a JS argument list, tolerating quoted and bare values.
fn split_args(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|a| a.trim().trim_matches(['\'', '"']).to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

fn truncate(handler: &str) -> String {
    const LIMIT: usize = 80;
    if handler.chars().count() <= LIMIT {
        handler.to_string()
    } else {
        let cut: String = handler.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}
