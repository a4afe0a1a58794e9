use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde_json::Value;

use pagekit::config::Config;
use pagekit::data::path;
use pagekit::logging;
use pagekit::page::Page;
use pagekit::router::NavigationOutcome;
use pagekit::view::{interpolate, Template, ViewDef};
use pagekit::App;

#[derive(Parser)]
#[command(name = "pagekit")]
#[command(about = "Headless page router and view renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config dir>/pagekit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a sequence of paths through the demo pages and print each result
    Navigate {
        /// Paths to visit, in order (e.g. / /about /users/7)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Interpolate a template against JSON data
    Render {
        /// Template text
        template: String,

        /// JSON object the template reads from
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn demo_page(builder: pagekit::page::PageBuilder, title: &str, body: &str) -> Page {
    let name = builder.name().to_string();
    builder
        .view(
            ViewDef::new(name)
                .data("title", Value::from(title))
                .template(Template::inline(body)),
        )
        .build()
}

async fn navigate(config: Config, paths: &[String]) -> anyhow::Result<()> {
    let app = App::builder(config).build()?;
    let router = app.router();

    router.route("/", "home", |b| demo_page(b, "Home", "<h1>{{title}}</h1>"))?;
    router.route("/about", "about", |b| {
        demo_page(b, "About", "<h1>{{title}}</h1><p>pagekit demo</p>")
    })?;
    router.named_route("user", "/users/:id", "user", |b| {
        demo_page(b, "User", "<h1>{{title}} {{params.id}}</h1>{{#if query.tab}}<p>tab: {{query.tab}}</p>{{/if}}")
    })?;

    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    for name in [
        "route:before",
        "route:after",
        "route:notfound",
        "route:error",
        "page:activated",
        "page:deactivated",
    ] {
        let events = events.clone();
        app.bus().on(name, move |_| {
            events.lock().push(name.to_string());
            Ok(())
        });
    }

    router.start().await;
    for target in paths {
        events.lock().clear();
        let outcome = router.navigate(target).await;
        let fired = events.lock().join(", ");
        match outcome {
            NavigationOutcome::Completed { page, path } => {
                let html = router.page(&page).map(|p| p.html()).unwrap_or_default();
                println!("{} -> {} [{}]", path, page, router.location().href());
                println!("  events: {}", fired);
                println!("  html:   {}", html);
            }
            other => println!("{} -> {:?} (events: {})", target, other, fired),
        }
    }

    app.teardown().await;
    Ok(())
}

fn render(template: &str, data: &str) -> anyhow::Result<()> {
    let data: Value = serde_json::from_str(data).context("--data must be JSON")?;
    let out = interpolate(template, &|key: &str| path::get_path(&data, key).cloned())?;
    println!("{}", out);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_stderr("debug");
    } else {
        logging::init_tracing();
    }

    match cli.command {
        Commands::Navigate { paths } => {
            let config = load_config(cli.config.as_ref())?;
            navigate(config, &paths).await
        }
        Commands::Render { template, data } => render(&template, &data),
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
