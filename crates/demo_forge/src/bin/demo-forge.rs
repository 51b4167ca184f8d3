use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ffmpeg_bindings::Ffmpeg;

use demo_forge::{
    tracing::init_tracing_subscriber, AgentMailClient, BrowserUseClient, DemoPipelineBuilder,
    FfmpegCompositor, FfmpegScreenRecorder, HeyGenClient, OpenAIClient,
};

#[derive(Parser)]
#[command(name = "demo-forge", about = "Agent-driven product demos and tutorial videos")]
struct Cli {
    /// Directory all artifacts are written to
    #[arg(long, default_value = "./outputs")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Explore a product, design courses and optionally execute and narrate them
    Explore(ExploreArgs),
    /// List avatars available to the HeyGen account
    Avatars {
        /// HeyGen API key
        #[arg(long, env = "HEYGEN_API_KEY")]
        heygen_key: String,
    },
    /// List voices available to the HeyGen account
    Voices {
        /// HeyGen API key
        #[arg(long, env = "HEYGEN_API_KEY")]
        heygen_key: String,
    },
    /// List HeyGen avatar groups
    AvatarGroups {
        /// HeyGen API key
        #[arg(long, env = "HEYGEN_API_KEY")]
        heygen_key: String,

        /// Include public avatar groups in the listing
        #[arg(long)]
        include_public: bool,
    },
}

#[derive(Args)]
struct ExploreArgs {
    /// URL of the product to explore
    url: String,

    /// Browser-Use API key
    #[arg(long, env = "BROWSER_USE_API_KEY")]
    browser_use_key: String,

    /// AgentMail API key
    #[arg(long, env = "AGENTMAIL_API_KEY")]
    agentmail_key: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// HeyGen API key, needed with --narrate
    #[arg(long, env = "HEYGEN_API_KEY")]
    heygen_key: Option<String>,

    /// Override the OpenAI API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// How many courses to design
    #[arg(long, default_value = "5")]
    courses: usize,

    /// Cap on how many designed courses are executed
    #[arg(long)]
    max_courses: Option<usize>,

    /// Execute the designed courses as recorded browser sessions
    #[arg(long)]
    execute: bool,

    /// Narrate executed courses and composite final videos
    #[arg(long, requires = "execute")]
    narrate: bool,

    /// Stop after exploration, skip course design
    #[arg(long, conflicts_with_all = ["execute", "narrate"])]
    no_courses: bool,
}

async fn run_explore(output_dir: PathBuf, args: ExploreArgs) -> anyhow::Result<()> {
    let parsed = url::Url::parse(&args.url).context("Invalid product URL")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Product URL must use http or https, got {}", parsed.scheme());
    }
    if args.narrate && args.heygen_key.is_none() {
        anyhow::bail!("--narrate needs a HeyGen API key (--heygen-key or HEYGEN_API_KEY)");
    }

    let mut openai = OpenAIClient::new(args.openai_key);
    if let Some(base_url) = args.openai_base_url {
        openai = openai.with_base_url(base_url);
    }
    let ffmpeg = Ffmpeg::new();

    // the avatar seam is only exercised with --narrate, which guarantees a
    // key above
    let mut builder = DemoPipelineBuilder::new(output_dir)
        .browser(BrowserUseClient::new(args.browser_use_key))
        .mail(AgentMailClient::new(args.agentmail_key))
        .extractor(openai.clone())
        .designer(openai.clone())
        .narrator(openai)
        .avatar_renderer(HeyGenClient::new(args.heygen_key.unwrap_or_default()))
        .recorder(FfmpegScreenRecorder::new(ffmpeg.clone()))
        .compositor(FfmpegCompositor::new(ffmpeg))
        .course_count(args.courses)
        .generate_courses(!args.no_courses)
        .execute_courses(args.execute)
        .narrate(args.narrate);
    if let Some(max_courses) = args.max_courses {
        builder = builder.max_courses(max_courses);
    }

    tracing::info!(url = %args.url, "Starting demo pipeline...");
    builder.build().run(&args.url).await?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    match cli.command {
        Command::Explore(args) => run_explore(cli.output_dir, args).await?,
        Command::Avatars { heygen_key } => {
            let avatars = HeyGenClient::new(heygen_key).list_avatars().await?;
            println!("{} avatars available:", avatars.len());
            for avatar in avatars {
                println!(
                    "  {}  {}",
                    avatar.avatar_id,
                    avatar.avatar_name.as_deref().unwrap_or("(unnamed)")
                );
            }
        }
        Command::Voices { heygen_key } => {
            let voices = HeyGenClient::new(heygen_key).list_voices().await?;
            println!("{} voices available:", voices.len());
            for voice in voices {
                println!(
                    "  {}  {} [{}, {}]",
                    voice.voice_id,
                    voice.label(),
                    voice.language.as_deref().unwrap_or("unknown"),
                    voice.gender.as_deref().unwrap_or("unknown"),
                );
            }
        }
        Command::AvatarGroups {
            heygen_key,
            include_public,
        } => {
            let groups = HeyGenClient::new(heygen_key)
                .list_avatar_groups(include_public)
                .await?;
            println!("{} avatar groups:", groups.total_count);
            for group in groups.avatar_group_list {
                println!(
                    "  {}  {} ({} looks, {})",
                    group.id,
                    group.name.as_deref().unwrap_or("(unnamed)"),
                    group.num_looks.unwrap_or(0),
                    group.group_type.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    Ok(())
}
