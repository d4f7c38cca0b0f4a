use clap::Parser;

mod commandline;
mod defaults;
mod file;
mod primitives;

use commandline::{Args, Output};
use config::Config;
use defaults::Defaults;

pub(crate) use file::{
    ConfigFile as Configuration, Media, OpenTelemetry, Repo, Sled, Thumbnail, Tracing,
};
pub(crate) use primitives::{Filesystem, LogFormat, ObjectStorage, Store, Targets};

/// Builds the configuration from defaults, an optional file, `RAWVAULT__` environment
/// variables and the command line, in increasing order of precedence
pub(crate) fn configure() -> color_eyre::Result<Configuration> {
    configure_without_clap(Args::parse())
}

fn configure_without_clap(args: Args) -> color_eyre::Result<Configuration> {
    let Output {
        config_format,
        save_to,
        config_file,
    } = args.into_output();

    let config = Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(config::Environment::with_prefix("RAWVAULT").separator("__"))
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(config)
}

/// Default configuration with scratch and diagnostics directories under `root`
#[cfg(test)]
pub(crate) fn testing(root: &std::path::Path) -> Configuration {
    use std::ffi::OsString;

    let args = Args::try_parse_from([
        OsString::from("rawvault"),
        OsString::from("run"),
        OsString::from("--temporary-directory"),
        root.join("tmp").into_os_string(),
        OsString::from("--media-diagnostics-path"),
        root.join("diagnostics").into_os_string(),
    ])
    .expect("Valid arguments");

    configure_without_clap(args).expect("Built configuration")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{commandline::Args, configure_without_clap, Repo, Store};

    fn parse(args: &[&str]) -> super::Configuration {
        let args = Args::try_parse_from(args).expect("Valid arguments");

        configure_without_clap(args).expect("Built configuration")
    }

    #[test]
    fn defaults() {
        let config = parse(&["rawvault", "run"]);

        assert_eq!(config.server.max_file_count, 32);
        assert_eq!(config.media.upload_concurrency, 4);
        assert_eq!(config.media.thumbnail.max_width, 1000);
        assert_eq!(config.media.thumbnail.max_height, 1000);
        assert!(config.media.thumbnail.allow_upscale);
        assert!(config.media.diagnostics_path.is_none());
        assert!(config.metrics.prometheus_address.is_none());
        assert!(matches!(config.store, Store::Filesystem(_)));
        assert!(matches!(config.repo, Repo::Sled(_)));
    }

    #[test]
    fn commandline_overrides_defaults() {
        let config = parse(&[
            "rawvault",
            "run",
            "--quota-global",
            "5000",
            "--media-thumbnail-allow-upscale",
            "false",
            "--media-upload-concurrency",
            "2",
            "filesystem",
            "--image-path",
            "/srv/images",
            "sled",
            "--path",
            "/srv/sled",
        ]);

        assert_eq!(config.quota.global, 5000);
        assert_eq!(config.media.upload_concurrency, 2);
        assert!(!config.media.thumbnail.allow_upscale);
        assert_eq!(config.media.thumbnail.quality, 85);

        let Store::Filesystem(filesystem) = config.store else {
            panic!("Expected filesystem store");
        };
        assert_eq!(filesystem.image_path, std::path::Path::new("/srv/images"));
        assert_eq!(
            filesystem.thumbnail_path,
            std::path::Path::new("/mnt/thumbnails")
        );

        let Repo::Sled(sled) = config.repo;
        assert_eq!(sled.path, std::path::Path::new("/srv/sled"));
    }

    #[test]
    fn saves_effective_configuration() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let save_to = dir.path().join("rawvault.toml");

        let save_arg = save_to.to_string_lossy().to_string();
        parse(&["rawvault", "--save-to", &save_arg, "run"]);

        let saved = std::fs::read_to_string(&save_to).expect("Saved configuration");
        assert!(saved.contains("[media.thumbnail]"));
        assert!(saved.contains("upload_concurrency = 4"));
    }
}
