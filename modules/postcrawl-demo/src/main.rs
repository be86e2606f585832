//! Command-line front end for the PostCrawl client.
//!
//! Reads `POSTCRAWL_*` settings from the environment (or `.env`).

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use postcrawl_client::{
    ClientConfig, ExtractRequest, ExtractedPost, PostCrawlClient, ResponseMode,
    SearchAndExtractRequest, SearchRequest, SearchResult, SocialPlatform,
};

#[derive(Parser)]
#[command(name = "postcrawl")]
#[command(about = "Search and extract Reddit and TikTok posts via PostCrawl")]
#[command(version)]
struct Cli {
    /// Use the blocking client API instead of the async one
    #[arg(long, global = true)]
    blocking: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search social platforms
    Search {
        query: String,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Extract posts from URLs
    Extract {
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search, then extract every hit
    SearchAndExtract {
        query: String,

        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Platform to search (repeatable)
    #[arg(short, long = "platform", value_enum, default_values_t = [Platform::Reddit])]
    platforms: Vec<Platform>,

    /// Results per page (1-100)
    #[arg(short, long, default_value_t = 10)]
    results: u32,

    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Include comment trees
    #[arg(long)]
    comments: bool,

    /// Ask for markdown instead of raw post data
    #[arg(long)]
    markdown: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Platform {
    Reddit,
    Tiktok,
}

impl From<Platform> for SocialPlatform {
    fn from(p: Platform) -> Self {
        match p {
            Platform::Reddit => SocialPlatform::Reddit,
            Platform::Tiktok => SocialPlatform::Tiktok,
        }
    }
}

impl SearchArgs {
    fn platforms(&self) -> Vec<SocialPlatform> {
        self.platforms.iter().copied().map(Into::into).collect()
    }
}

impl OutputArgs {
    fn mode(&self) -> ResponseMode {
        if self.markdown {
            ResponseMode::Markdown
        } else {
            ResponseMode::Raw
        }
    }
}

enum Output {
    Hits(Vec<SearchResult>),
    Posts(Vec<ExtractedPost>),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("postcrawl=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::from_env()?;
    config.log_redacted();
    let client = PostCrawlClient::from_config(config)?;

    let output = if cli.blocking {
        let output = run_blocking(&client, cli.command)?;
        client.close_blocking()?;
        output
    } else {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let output = run_async(&client, cli.command).await;
            client.close().await;
            output
        })?
    };

    print_output(&output);

    let limits = client.rate_limit();
    info!(
        limit = ?limits.limit,
        remaining = ?limits.remaining,
        reset = ?limits.reset,
        "Rate limit"
    );
    Ok(())
}

async fn run_async(client: &PostCrawlClient, command: Commands) -> Result<Output> {
    let output = match command {
        Commands::Search { query, search } => {
            let request = SearchRequest::new(search.platforms(), query)
                .with_results(search.results)
                .with_page(search.page);
            Output::Hits(client.search(&request).await?)
        }
        Commands::Extract { urls, output } => {
            let request = ExtractRequest::new(urls)
                .with_comments(output.comments)
                .with_response_mode(output.mode());
            Output::Posts(client.extract(&request).await?)
        }
        Commands::SearchAndExtract {
            query,
            search,
            output,
        } => {
            let request = SearchAndExtractRequest::new(search.platforms(), query)
                .with_results(search.results)
                .with_page(search.page)
                .with_comments(output.comments)
                .with_response_mode(output.mode());
            Output::Posts(client.search_and_extract(&request).await?)
        }
    };
    Ok(output)
}

fn run_blocking(client: &PostCrawlClient, command: Commands) -> Result<Output> {
    let output = match command {
        Commands::Search { query, search } => {
            let request = SearchRequest::new(search.platforms(), query)
                .with_results(search.results)
                .with_page(search.page);
            Output::Hits(client.search_blocking(&request)?)
        }
        Commands::Extract { urls, output } => {
            let request = ExtractRequest::new(urls)
                .with_comments(output.comments)
                .with_response_mode(output.mode());
            Output::Posts(client.extract_blocking(&request)?)
        }
        Commands::SearchAndExtract {
            query,
            search,
            output,
        } => {
            let request = SearchAndExtractRequest::new(search.platforms(), query)
                .with_results(search.results)
                .with_page(search.page)
                .with_comments(output.comments)
                .with_response_mode(output.mode());
            Output::Posts(client.search_and_extract_blocking(&request)?)
        }
    };
    Ok(output)
}

fn print_output(output: &Output) {
    match output {
        Output::Hits(hits) => {
            for hit in hits {
                println!("{}  {}", hit.title, hit.url);
                if !hit.date.is_empty() {
                    println!("    {}", hit.date);
                }
            }
            println!("{} results", hits.len());
        }
        Output::Posts(posts) => {
            for post in posts {
                print_post(post);
            }
            println!("{} posts", posts.len());
        }
    }
}

fn print_post(post: &ExtractedPost) {
    if let Some(error) = &post.error {
        println!("[error] {}  {}", post.url, error);
        return;
    }
    if let Some(reddit) = post.reddit_post() {
        println!(
            "[reddit] r/{}  {}  score={}  comments={}",
            reddit.subreddit_name,
            reddit.title,
            reddit.score,
            reddit.comments.len()
        );
    } else if let Some(tiktok) = post.tiktok_post() {
        println!(
            "[tiktok] @{}  likes={}  comments={}",
            tiktok.username, tiktok.likes, tiktok.total_comments
        );
    } else if post.untyped().is_some() {
        println!("[{}] {}  (unrecognised payload)", post.source, post.url);
    } else {
        println!("[{}] {}", post.source, post.url);
    }
    if let Some(markdown) = &post.markdown {
        println!("{markdown}");
    }
}
