use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use vidfaces::config::Config;
use vidfaces::curation::Curator;
use vidfaces::db::Database;
use vidfaces::export::{export_faces, ExportFormat};
use vidfaces::ingest::{CommandExtractor, CommandProbe, Ingester, Style};
use vidfaces::logging;
use vidfaces::query::{group, query, FaceFilter, GroupAxis, Preview};
use vidfaces::resolver::{ContentResolver, Resolution};
use vidfaces::RegistryError;

enum Command {
    Ingest {
        video: PathBuf,
        style: Option<Style>,
        fps: Option<f64>,
    },
    Import {
        video: PathBuf,
        extracted: PathBuf,
        fps: Option<f64>,
    },
    List {
        filter: FaceFilter,
        axis: GroupAxis,
    },
    Resolve {
        image: PathBuf,
    },
    Rename {
        face_id: i64,
        name: String,
    },
    Merge {
        name: String,
        face_ids: Vec<i64>,
    },
    Clear {
        confirmed: bool,
    },
    Export {
        path: PathBuf,
        format: Option<ExportFormat>,
        filter: FaceFilter,
    },
    Backfill,
    Stats,
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Result<Cli> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("vidfaces {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value(&args, i, "--config")?));
                i += 1;
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((name, args)) = rest.split_first() else {
        print_help();
        std::process::exit(1);
    };

    Ok(Cli {
        config_path,
        command: parse_command(name, args)?,
    })
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    match args.get(i + 1) {
        Some(v) => Ok(v),
        None => bail!("{} requires a value", flag),
    }
}

fn parse_fps(raw: &str) -> Result<f64> {
    raw.parse()
        .with_context(|| format!("--fps expects a number, got {:?}", raw))
}

fn parse_command(name: &str, args: &[String]) -> Result<Command> {
    let mut positional = Vec::new();
    let mut style = None;
    let mut fps = None;
    let mut filter = FaceFilter::default();
    let mut axis = GroupAxis::Person;
    let mut format = None;
    let mut confirmed = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--style" | "-s" => {
                style = Some(value(args, i, "--style")?.parse()?);
                i += 1;
            }
            "--fps" => {
                fps = Some(parse_fps(value(args, i, "--fps")?)?);
                i += 1;
            }
            "--video" => {
                filter.video = Some(value(args, i, "--video")?.to_string());
                i += 1;
            }
            "--name" | "-n" => {
                filter.name = Some(value(args, i, "--name")?.to_string());
                i += 1;
            }
            "--group" | "-g" => {
                axis = value(args, i, "--group")?.parse()?;
                i += 1;
            }
            "--format" | "-f" => {
                format = Some(value(args, i, "--format")?.parse()?);
                i += 1;
            }
            "--yes" | "-y" => confirmed = true,
            other if other.starts_with('-') && other.parse::<i64>().is_err() => {
                bail!("Unknown option for {}: {}", name, other)
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let arity = |count: usize, usage: &str| -> Result<()> {
        if positional.len() != count {
            bail!("Usage: vidfaces {}", usage);
        }
        Ok(())
    };

    let command = match name {
        "ingest" => {
            arity(1, "ingest <video> [--style live|anime] [--fps N]")?;
            Command::Ingest {
                video: PathBuf::from(&positional[0]),
                style,
                fps,
            }
        }
        "import" => {
            arity(2, "import <video> <extracted-dir> [--fps N]")?;
            Command::Import {
                video: PathBuf::from(&positional[0]),
                extracted: PathBuf::from(&positional[1]),
                fps,
            }
        }
        "list" => {
            arity(0, "list [--video NAME] [--name TEXT] [--group person|video|chronological]")?;
            Command::List { filter, axis }
        }
        "resolve" => {
            arity(1, "resolve <image-file>")?;
            Command::Resolve {
                image: PathBuf::from(&positional[0]),
            }
        }
        "rename" => {
            arity(2, "rename <face-id> <name>")?;
            Command::Rename {
                face_id: parse_face_id(&positional[0])?,
                name: positional[1].clone(),
            }
        }
        "merge" => {
            if positional.len() < 2 {
                bail!("Usage: vidfaces merge <name> <face-id>...");
            }
            Command::Merge {
                name: positional[0].clone(),
                face_ids: positional[1..]
                    .iter()
                    .map(|s| parse_face_id(s))
                    .collect::<Result<_>>()?,
            }
        }
        "clear" => {
            arity(0, "clear --yes")?;
            Command::Clear { confirmed }
        }
        "export" => {
            arity(1, "export <path> [--format json|csv] [--video NAME] [--name TEXT]")?;
            Command::Export {
                path: PathBuf::from(&positional[0]),
                format,
                filter,
            }
        }
        "backfill" => Command::Backfill,
        "stats" => Command::Stats,
        other => bail!("Unknown command: {} (see --help)", other),
    };

    Ok(command)
}

fn parse_face_id(raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("Face ids are integers, got {:?}", raw))
}

fn print_help() {
    println!(
        r#"vidfaces - registry of faces extracted from videos

USAGE:
    vidfaces [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    ingest <video> [--style live|anime] [--fps N]
                        Extract faces from a video and register them
    import <video> <extracted-dir> [--fps N]
                        Register crops an extractor already wrote
    list [--video NAME] [--name TEXT] [--group person|video|chronological]
                        Show faces, grouped
    resolve <image-file>
                        Find the face a copied crop belongs to
    rename <face-id> <name>
                        Name a single face
    merge <name> <face-id>...
                        Give several faces the same name
    clear --yes         Remove every face and video
    export <path> [--format json|csv] [--video NAME] [--name TEXT]
                        Write matching faces to a file
    backfill            Fingerprint faces registered without one
    stats               Show registry counts

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    VIDFACES_CONFIG     Path to config file (overrides default location)
    VIDFACES_LOG        Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/vidfaces/config.toml"#
    );
}

#[tokio::main]
async fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    // Journald on Linux, rolling file otherwise
    let _ = logging::init(None);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<RegistryError>() {
            Some(err) => eprintln!("{}: {}", err.kind(), err),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.db_path)?;
    db.initialize()?;
    info!("Registry opened at {:?}", config.db_path);

    match cli.command {
        Command::Ingest { video, style, fps } => {
            let fps = match fps {
                Some(fps) => fps,
                None => CommandProbe::new(&config.probe).probe_fps(&video).await,
            };
            let style = style.unwrap_or(config.ingest.default_style);
            let ingester = Ingester::new(CommandExtractor::new(&config.extractor), &config.ingest);

            println!("Extracting faces from {} ({} style)...", video.display(), style);
            let report = ingester.ingest(&db, &video, style, fps).await?;
            println!("{}", report);
        }
        Command::Import { video, extracted, fps } => {
            let fps = match fps {
                Some(fps) => fps,
                None => CommandProbe::new(&config.probe).probe_fps(&video).await,
            };
            let ingester = Ingester::new(CommandExtractor::new(&config.extractor), &config.ingest);
            let report = ingester.ingest_extracted(&db, &video, &extracted, fps)?;
            println!("{}", report);
        }
        Command::List { filter, axis } => list(&db, &filter, axis)?,
        Command::Resolve { image } => match ContentResolver::new(&db).resolve_file(&image)? {
            Resolution::Found(id) => println!("{}", id),
            Resolution::NotFound => {
                println!("No registered face matches {}", image.display());
                std::process::exit(3);
            }
        },
        Command::Rename { face_id, name } => {
            println!("{}", Curator::new(&db).rename(face_id, &name)?);
        }
        Command::Merge { name, face_ids } => {
            println!("{}", Curator::new(&db).merge(&face_ids, &name)?);
        }
        Command::Clear { confirmed } => {
            if !confirmed {
                bail!("Refusing to clear the registry without --yes");
            }
            println!("{}", Curator::new(&db).clear()?);
        }
        Command::Export { path, format, filter } => {
            let format = format.unwrap_or_else(|| ExportFormat::from_path(&path));
            let views = query(&db, &filter)?;
            let count = export_faces(&views, &path, format)?;
            println!("Exported {} face(s) as {} to {}", count, format.name(), path.display());
        }
        Command::Backfill => {
            let report = ContentResolver::new(&db).backfill_fingerprints()?;
            println!("Fingerprinted {} face(s)", report.updated);
            for path in &report.missing_files {
                println!("  missing: {}", path);
            }
        }
        Command::Stats => stats(&db)?,
    }

    Ok(())
}

fn list(db: &Database, filter: &FaceFilter, axis: GroupAxis) -> Result<()> {
    let views = query(db, filter)?;
    if views.is_empty() {
        println!("No faces found");
        return Ok(());
    }

    for group in group(&views, axis) {
        println!("{} ({})", group.key, group.faces.len());
        for view in &group.faces {
            let preview = match view.load_preview() {
                Preview::Available(bytes) => format!("{} bytes", bytes.len()),
                Preview::Missing => "missing".to_string(),
            };
            println!(
                "  #{:<6} {:<24} {:>9.2}s  {}  [{}]",
                view.face.id,
                view.display_name(),
                view.face.timestamp_seconds,
                short_path(Path::new(&view.face.image_path)),
                preview
            );
        }
    }
    Ok(())
}

fn short_path(path: &Path) -> String {
    let parts: Vec<_> = path.iter().rev().take(3).collect();
    parts
        .into_iter()
        .rev()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn stats(db: &Database) -> Result<()> {
    let stats = db.get_stats()?;
    println!("Videos:            {}", stats.videos);
    println!("Faces:             {}", stats.faces);
    println!("Named faces:       {}", stats.named_faces);
    println!("Unclustered faces: {}", stats.unclustered_faces);
    println!("Display names:     {}", stats.display_names);

    for video in db.get_all_videos()? {
        println!(
            "  #{:<4} {}  {}  {:.3} fps",
            video.id,
            video.upload_date.format("%Y-%m-%d %H:%M:%S"),
            video.filename,
            video.fps
        );
    }
    Ok(())
}
