use crate::{
    config::primitives::{LogFormat, Targets},
    serde_str::Serde,
};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            console_address,
            console_buffer_capacity,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets.map(Serde::new),
                log_spans,
            },
            console: Console {
                address: console_address,
                buffer_capacity: console_buffer_capacity,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets.map(Serde::new),
            },
        };

        let Command::Run(Run {
            address,
            api_key,
            temporary_directory,
            metrics_prometheus_address,
            max_file_count,
            media_max_file_size,
            media_upload_concurrency,
            media_process_timeout,
            media_diagnostics_path,
            media_thumbnail_max_width,
            media_thumbnail_max_height,
            media_thumbnail_quality,
            media_thumbnail_allow_upscale,
            quota_global,
            store,
        }) = command;

        let server = Server {
            address,
            api_key,
            max_file_count,
            temporary_directory,
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let thumbnail = Thumbnail {
            max_width: media_thumbnail_max_width,
            max_height: media_thumbnail_max_height,
            quality: media_thumbnail_quality,
            allow_upscale: media_thumbnail_allow_upscale,
        };

        let media = Media {
            max_file_size: media_max_file_size,
            upload_concurrency: media_upload_concurrency,
            process_timeout: media_process_timeout,
            diagnostics_path: media_diagnostics_path,
            thumbnail: thumbnail.set(),
        };

        let quota = Quota {
            global: quota_global,
        };

        let (store, repo) = match store {
            Some(RunStore::Filesystem(RunFilesystem { system, repo })) => {
                (Some(Store::Filesystem(system)), repo)
            }
            Some(RunStore::ObjectStorage(RunObjectStorage { storage, repo })) => {
                (Some(Store::ObjectStorage(storage)), repo)
            }
            None => (None, None),
        };

        Output {
            config_format: ConfigFormat {
                server,
                tracing,
                metrics,
                media,
                quota,
                repo,
                store,
            },
            save_to,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    quota: Quota,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<Store>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    console: Console,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Console {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer_capacity: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Thumbnail {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_upscale: Option<bool>,
}

impl Thumbnail {
    fn set(self) -> Option<Self> {
        let any_set = self.max_width.is_some()
            || self.max_height.is_some()
            || self.quality.is_some()
            || self.allow_upscale.is_some();

        if any_set {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Quota {
    #[serde(skip_serializing_if = "Option::is_none")]
    global: Option<i64>,
}

/// Run the rawvault photo service
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the rawvault configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// Address and port to expose tokio-console metrics
    #[arg(long)]
    console_address: Option<SocketAddr>,
    /// Capacity of the console-subscriber Event Buffer
    #[arg(long)]
    console_buffer_capacity: Option<usize>,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the rawvault web server
    Run(Run),
}

#[derive(Debug, Parser)]
struct Run {
    /// The address and port to bind the rawvault web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The API KEY required to access internal routes
    #[arg(long)]
    api_key: Option<String>,

    /// The temporary directory rawvault should use when decoding RAW files
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// How many files are allowed to be uploaded per-request
    ///
    /// This number defaults to 32
    #[arg(long)]
    max_file_count: Option<u32>,

    /// The maximum size, in megabytes, of one uploaded file
    #[arg(long)]
    media_max_file_size: Option<usize>,

    /// How many files of one upload are processed at the same time
    ///
    /// This number defaults to 4
    #[arg(long)]
    media_upload_concurrency: Option<usize>,

    /// Timeout, in seconds, for decoding or thumbnailing one file
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// Directory in which to keep files that failed thumbnail generation
    #[arg(long)]
    media_diagnostics_path: Option<PathBuf>,

    /// The maximum width, in pixels, of generated thumbnails
    #[arg(long)]
    media_thumbnail_max_width: Option<u32>,

    /// The maximum height, in pixels, of generated thumbnails
    #[arg(long)]
    media_thumbnail_max_height: Option<u32>,

    /// The JPEG quality of generated thumbnails, 1 to 100
    #[arg(long)]
    media_thumbnail_quality: Option<u8>,

    /// Whether images smaller than the thumbnail bounds are scaled up to fit them
    #[arg(long)]
    media_thumbnail_allow_upscale: Option<bool>,

    /// Byte ceiling for all stored photos together. Zero or negative is unlimited
    #[arg(long, allow_negative_numbers = true)]
    quota_global: Option<i64>,

    #[command(subcommand)]
    store: Option<RunStore>,
}

/// Configure the provided storage
#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
// allow large enum variant - this is an instantiated-once config
#[allow(clippy::large_enum_variant)]
enum Store {
    Filesystem(Filesystem),

    ObjectStorage(crate::config::primitives::ObjectStorage),
}

/// Run rawvault with the provided storage
#[derive(Debug, Subcommand)]
// allow large enum variant - this is an instantiated-once config
#[allow(clippy::large_enum_variant)]
enum RunStore {
    /// Run rawvault with filesystem storage
    Filesystem(RunFilesystem),

    /// Run rawvault with object storage
    ObjectStorage(RunObjectStorage),
}

/// Run rawvault with the provided filesystem storage
#[derive(Debug, Parser)]
struct RunFilesystem {
    #[command(flatten)]
    system: Filesystem,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Run rawvault with the provided object storage
#[derive(Debug, Parser)]
struct RunObjectStorage {
    #[command(flatten)]
    storage: crate::config::primitives::ObjectStorage,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Configuration for data repositories
#[derive(Debug, Subcommand, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    /// Run rawvault with the provided sled-backed data repository
    Sled(Sled),
}

/// Configuration for filesystem media storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Filesystem {
    /// The path to store uploaded originals
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    image_path: Option<PathBuf>,

    /// The path to store generated thumbnails
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_path: Option<PathBuf>,
}

/// Configuration for the sled-backed data repository
#[derive(Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    /// The path to store the sled database
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}
