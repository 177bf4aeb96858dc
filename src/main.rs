use clap::{Parser, Subcommand};
use headshot_studio::batch::{self, BatchFile, BatchLimits};
use headshot_studio::catalog::Catalog;
use headshot_studio::config::{self, ClientConfig};
use headshot_studio::geometry::PreviewEstimate;
use headshot_studio::naming;
use headshot_studio::output;
use headshot_studio::remote::{CatalogService, HttpService, SourceImage};
use headshot_studio::session::Session;
use headshot_studio::settings::{Edit, OutputFormat};
use headshot_studio::store::{self, ClipboardSink, FileStore, SettingsStore};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Settings edits applied before the command runs.
#[derive(clap::Args, Clone, Default)]
struct EditArgs {
    /// Set a field, e.g. `--set preset=square --set format=jpeg`
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    edits: Vec<String>,

    /// Start from a saved profile (by name or id)
    #[arg(long)]
    profile: Option<String>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "headshot-studio")]
#[command(about = "Tune, preview and export headshots through a processing service")]
#[command(long_about = "\
Tune, preview and export headshots through a processing service

Settings persist between runs in the state directory. Edit them with
--set FIELD=VALUE on any command, or save them as named profiles.

Fields:
  removeBg, background, backgroundHex, preset, topBias, format,
  jpegQuality, autoUpdate, brightness, contrast, color, sharpness,
  soften, style, useCase

Examples:
  headshot-studio crop me.jpg --set preset=passport-2x2
  headshot-studio process me.jpg --set useCase=linkedin --out exports/
  headshot-studio batch team/ --profile \"Team page\"
  headshot-studio profiles export > profiles.json

Run 'headshot-studio gen-config' to generate a documented headshot-studio.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Directory for persisted settings and profiles (overrides config)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Processing service base URL (overrides config)
    #[arg(long, global = true)]
    service_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the crop and output size a photo would get
    Crop {
        /// Source photo
        #[arg(required_unless_present = "size")]
        image: Option<PathBuf>,
        /// Source size instead of a file, e.g. 1000x1000
        #[arg(long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Check which files a batch would accept
    Check {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Process one photo
    Process {
        image: PathBuf,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Process many photos into one zip archive
    Batch {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Show or edit the persisted settings
    Settings {
        #[command(flatten)]
        edit: EditArgs,
        /// Import a preset file into the current settings
        #[arg(long)]
        import: Option<PathBuf>,
    },
    /// Manage saved profiles
    #[command(subcommand)]
    Profiles(ProfilesCommand),
    /// Show presets, styles and use-cases
    Catalog {
        /// Ask the service instead of using the built-in catalog
        #[arg(long)]
        remote: bool,
    },
    /// Print a stock headshot-studio.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum ProfilesCommand {
    /// List saved profiles
    List,
    /// Save the current settings as a profile
    Save {
        /// Profile name (defaults to the use-case or preset name)
        #[arg(default_value = "")]
        name: String,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Delete a profile by name or id
    Delete { name: String },
    /// Export one profile, or all of them, as JSON
    Export {
        /// Profile name or id; omit for a bundle of every profile
        name: Option<String>,
        /// Write to the clipboard (falling back to a file) instead of stdout
        #[arg(long)]
        clipboard: bool,
    },
    /// Import a bundle of profiles
    Import {
        file: PathBuf,
        /// Replace profiles with the same name instead of renaming
        #[arg(long)]
        overwrite: bool,
    },
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value}"))?;
    let parse = |s: &str| s.trim().parse::<u32>().map_err(|e| format!("{s}: {e}"));
    Ok((parse(w)?, parse(h)?))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(&cli.config)?;
    if let Some(dir) = &cli.state_dir {
        config.storage.dir = dir.clone();
    }
    if let Some(url) = &cli.service_url {
        config.service.base_url = url.clone();
    }

    match cli.command {
        Command::Crop { image, size, edit } => {
            let mut session = open_session(&config, Catalog::builtin());
            apply_edits(&mut session, &edit)?;
            let source = match (size, image) {
                (Some(size), _) => size,
                (None, Some(path)) => SourceImage::from_path(&path)?
                    .dimensions
                    .ok_or_else(|| format!("could not read dimensions of {}", path.display()))?,
                (None, None) => return Err("a photo or --size is required".into()),
            };
            let settings = session.settings();
            let preset = session
                .catalog()
                .preset(&settings.preset)
                .ok_or_else(|| format!("unknown preset {}", settings.preset))?;
            let estimate = PreviewEstimate::compute(source, preset, settings.top_bias, settings.format);
            output::print_estimate(preset, &estimate);
            session.teardown();
        }
        Command::Check { paths } => {
            let limits = BatchLimits::from(&config.limits);
            let selection = select_files(&paths, &limits)?;
            output::print_batch_selection(&selection, &limits);
        }
        Command::Process { image, out, edit } => {
            let service = http_service(&config)?;
            let mut session = open_session(&config, remote_catalog(&service));
            if let Ok(health) = service.health() {
                session.apply_health(&health);
            }
            apply_edits(&mut session, &edit)?;
            output::print_settings(session.settings(), session.catalog());

            let now = now_ms();
            session.set_source(now, SourceImage::from_path(&image)?);
            if let Some(effect) = session.process_now(now) {
                session.execute(now, effect, &service);
            }
            let result = match session.preview() {
                Some(preview) => {
                    let format = OutputFormat::parse(preview.meta.format.as_deref().unwrap_or(""))
                        .unwrap_or(session.settings().format);
                    let name = naming::output_file_name(&image.to_string_lossy(), format);
                    std::fs::create_dir_all(&out)?;
                    let path = out.join(name);
                    std::fs::write(&path, &preview.bytes)?;
                    output::print_process_result(&preview.meta, &path, preview.bytes.len());
                    Ok(())
                }
                None => Err(session
                    .notice(now)
                    .unwrap_or(headshot_studio::remote::FALLBACK_MESSAGE)
                    .to_string()),
            };
            session.teardown();
            result?;
        }
        Command::Batch { paths, out, edit } => {
            let service = http_service(&config)?;
            let mut session = open_session(&config, remote_catalog(&service));
            if let Ok(health) = service.health() {
                session.apply_health(&health);
            }
            apply_edits(&mut session, &edit)?;

            let selection = select_files(&paths, session.limits())?;
            let images = selection
                .accepted
                .iter()
                .map(|file| SourceImage::from_path(&file.path))
                .collect::<std::io::Result<Vec<_>>>()?;

            let now = now_ms();
            let Some(effect) = session.start_batch(now, images) else {
                return Err(session.notice(now).unwrap_or("Nothing to process.").to_string().into());
            };
            if let Some(message) = session.notice(now) {
                eprintln!("{message}");
            }
            session.execute(now, effect, &service);
            let result = match session.last_batch() {
                Some(archive) => {
                    std::fs::create_dir_all(&out)?;
                    let path = out.join(&archive.filename);
                    std::fs::write(&path, &archive.bytes)?;
                    output::print_batch_result(archive, &path);
                    if let Some(message) = session.notice(now).filter(|_| archive.failed > 0) {
                        eprintln!("{message}");
                    }
                    Ok(())
                }
                None => Err(session
                    .notice(now)
                    .unwrap_or("Batch processing failed.")
                    .to_string()),
            };
            session.teardown();
            result?;
        }
        Command::Settings { edit, import } => {
            let mut session = open_session(&config, Catalog::builtin());
            apply_edits(&mut session, &edit)?;
            if let Some(path) = import {
                let text = std::fs::read_to_string(&path)?;
                if let Some(name) = session.import_preset(now_ms(), &text)? {
                    println!("Imported preset {name}");
                }
            }
            output::print_settings(session.settings(), session.catalog());
            session.teardown();
        }
        Command::Profiles(command) => run_profiles(&config, command)?,
        Command::Catalog { remote } => {
            if remote {
                let service = http_service(&config)?;
                output::print_health(&service.health()?);
                println!();
                output::print_catalog(&service.catalog()?);
            } else {
                output::print_catalog(&Catalog::builtin());
            }
        }
        // printed before any config is loaded
        Command::GenConfig => {}
    }

    Ok(())
}

fn run_profiles(config: &ClientConfig, command: ProfilesCommand) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(config, Catalog::builtin());
    match command {
        ProfilesCommand::List => output::print_profiles(session.profiles(), session.catalog()),
        ProfilesCommand::Save { name, edit } => {
            apply_edits(&mut session, &edit)?;
            let profile = session.save_profile(now_ms(), &name);
            println!("Saved profile {}", profile.name);
        }
        ProfilesCommand::Delete { name } => {
            let id = find_profile_id(&session, &name)?;
            session.delete_profile(&id);
            println!("Deleted profile {name}");
        }
        ProfilesCommand::Export { name, clipboard } => {
            let (filename, text) = match name {
                Some(name) => {
                    let id = find_profile_id(&session, &name)?;
                    let profile = session
                        .store()
                        .profile(&id)
                        .ok_or_else(|| format!("no profile named {name}"))?;
                    (
                        format!("{}.json", naming::safe_stem(&profile.name)),
                        store::export::preset_document(&profile.name, &profile.settings),
                    )
                }
                None => ("headshot-profiles.json".to_string(), session.export_bundle()),
            };
            if clipboard {
                let mut sink = ClipboardSink::new(".");
                let outcome = store::deliver(&mut sink, &filename, &text)?;
                println!("{outcome}");
            } else {
                println!("{text}");
            }
        }
        ProfilesCommand::Import { file, overwrite } => {
            let text = std::fs::read_to_string(&file)?;
            let summary = session.merge_bundle(now_ms(), &text, overwrite)?;
            println!("{}", output::format_merge_summary(&summary));
        }
    }
    session.teardown();
    Ok(())
}

fn open_session(config: &ClientConfig, catalog: Catalog) -> Session {
    let backend = FileStore::new(&config.storage.dir);
    let store = SettingsStore::new(Box::new(backend), config);
    Session::new(config, catalog, store)
}

fn http_service(config: &ClientConfig) -> Result<HttpService, Box<dyn std::error::Error>> {
    Ok(HttpService::new(
        &config.service.base_url,
        Duration::from_secs(config.service.timeout_secs),
    )?)
}

/// The service catalog, or the built-in one when the service cannot say.
fn remote_catalog(service: &HttpService) -> Catalog {
    service.catalog().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "using built-in catalog");
        Catalog::builtin()
    })
}

/// Apply `--profile` then each `--set`, in order.
fn apply_edits(session: &mut Session, args: &EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    let now = now_ms();
    if let Some(name) = &args.profile {
        let id = find_profile_id(session, name)?;
        session.apply_profile(now, &id);
    }
    for assignment in &args.edits {
        session.edit(now, Edit::parse_assignment(assignment)?)?;
    }
    Ok(())
}

fn find_profile_id(session: &Session, name_or_id: &str) -> Result<String, String> {
    session
        .store()
        .find_profile(name_or_id)
        .or_else(|| session.store().profile(name_or_id))
        .map(|p| p.id.clone())
        .ok_or_else(|| format!("no profile named {name_or_id}"))
}

/// Expand paths and check them against `limits` without reading contents.
fn select_files(
    paths: &[PathBuf],
    limits: &BatchLimits,
) -> Result<batch::BatchSelection<BatchFile>, Box<dyn std::error::Error>> {
    let files = batch::collect_candidates(paths)
        .iter()
        .map(|p| BatchFile::from_path(p))
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(batch::validate(files, limits))
}
