// SPDX-License-Identifier: GPL-2.0-or-later

#![allow(clippy::unused_async)]

#[cfg(test)]
mod test;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use common::{ILogger, LogEntry, LogLevel};
use env::Config;
use log::Logger;
use playback::{ErrorKind, Format};
use serde::Deserialize;
use std::{sync::Arc, time::SystemTime};
use web::{serve_fmp4_content, serve_mp4_content};

#[derive(Clone)]
pub struct GetHandlerState {
    pub logger: Arc<Logger>,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    pub path: String,
    /// Start of the requested window, Unix nanoseconds.
    pub start: i64,
    /// Requested duration, nanoseconds.
    pub duration: i64,
    pub format: RequestedFormat,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedFormat {
    Fmp4,
    Mp4,
}

impl From<RequestedFormat> for Format {
    fn from(f: RequestedFormat) -> Self {
        match f {
            RequestedFormat::Fmp4 => Format::Fmp4,
            RequestedFormat::Mp4 => Format::Mp4,
        }
    }
}

/// Serves a requested segment of recorded video, re-muxed into the
/// requested container. Grounded on the teacher's `vod_handler`: shared
/// state extracted via `State`, the query deserialized with `Query`, and
/// the domain error mapped to a status code through a single `kind()`
/// dispatch point before falling through to the shared content server.
pub async fn get_handler(
    State(state): State<GetHandlerState>,
    Query(query): Query<GetQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let Some(path_config) = state.config.paths.get(&query.path) else {
        return (StatusCode::NOT_FOUND, format!("unknown path: {}", query.path)).into_response();
    };

    let format: Format = query.format.into();
    let result = playback::serve(
        &state.config.recordings_dir,
        &query.path,
        &path_config.record_path_template,
        common::time::UnixNano::from(query.start),
        common::time::Duration::from(query.duration),
        format,
    )
    .await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Corrupt => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Io | ErrorKind::Internal => {
                    state.logger.log(LogEntry::new(
                        LogLevel::Error,
                        "playback",
                        format!("get handler: {e}"),
                    ));
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            return (status, e.to_string()).into_response();
        }
    };

    match format {
        Format::Mp4 => {
            serve_mp4_content(&method, &headers, SystemTime::now(), output.size, output.reader)
                .await
        }
        Format::Fmp4 => serve_fmp4_content(output.size, output.reader).await,
    }
}
