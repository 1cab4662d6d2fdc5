//! Signalbox CLI: command-line client for the Signalbox tracking engine.
//!
//! Talks to the server's admin API over HTTP, runs complete page sessions
//! in-process against a printing host, and smoke-tests conversions-mirror
//! credentials with one real POST.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use signalbox_core::countdown::{DISPLAY_OFFSET_HOURS, format_date_pt};
use signalbox_core::engage::{ClickTarget, ScrollSample, VideoSignal, VideoSignalKind};
use signalbox_core::error::{MirrorError, ScriptError};
use signalbox_core::event::{CustomData, EventName, TrackingEvent};
use signalbox_core::mirror::{ConversionsMirror, HttpMirrorTransport, MirrorTransport};
use signalbox_core::page::PageContext;
use signalbox_core::script::{ScriptClient, ScriptHost, ScriptKind, TagClient};
use signalbox_core::session::PageSession;
use signalbox_store::{PageSettings, PixelConfig, Vendor};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// Signalbox: marketing-event tracking, inspected from the terminal.
#[derive(Parser)]
#[command(
    name = "signalbox",
    version,
    about = "Signalbox CLI — manage landing-page settings and exercise the tracking engine",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         SIGNALBOX_ADDR    Server address (default: http://127.0.0.1:8080)\n  \
         SIGNALBOX_TOKEN   Admin bearer token (identity-provider JWT)\n\n\
         {DIM}Examples:{RESET}\n  \
         signalbox settings show\n  \
         signalbox settings set --event-date 2025-11-19T22:00:00Z\n  \
         signalbox simulate --scroll --clicks 2 --video-progress 0.8\n  \
         signalbox mirror-test --pixel-id 1234567890 --token EAAB..."
    ),
)]
struct Cli {
    /// Signalbox server address.
    #[arg(long, env = "SIGNALBOX_ADDR", default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Admin bearer token.
    #[arg(long, env = "SIGNALBOX_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Landing-page settings operations.
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Drive a full page session against a printing host: script loading,
    /// pixel initialization, page view, engagement events, mirror payloads.
    Simulate {
        /// Page URL the simulated visitor lands on.
        #[arg(
            long,
            default_value = "https://pages.example.com/landing?utm_source=cli&utm_campaign=smoke"
        )]
        url: String,
        /// Page title.
        #[arg(long, default_value = "Signalbox Simulation")]
        title: String,
        /// Pixel spec `vendor:external_id[:server_token]`, repeatable.
        /// Vendors: social_ads, search_ads, web_analytics.
        #[arg(long = "pixel", value_name = "SPEC")]
        pixels: Vec<String>,
        /// Scroll past the 75% depth mark.
        #[arg(long)]
        scroll: bool,
        /// Number of button clicks to simulate.
        #[arg(long, default_value = "0")]
        clicks: u32,
        /// Watch a video up to this share of its length (0.0 to 1.0).
        #[arg(long)]
        video_progress: Option<f64>,
    },
    /// Send one real conversions event to the vendor endpoint to verify a
    /// pixel id / server token pair.
    MirrorTest {
        /// Pixel id at the vendor.
        #[arg(long)]
        pixel_id: String,
        /// Conversions API access token.
        #[arg(long, env = "SIGNALBOX_MIRROR_TOKEN")]
        token: String,
        /// Event to send: page_view, scroll, click, video_play, video_25,
        /// video_50, video_75, or video_complete.
        #[arg(long, default_value = "page_view")]
        event: String,
        /// Source URL reported with the event.
        #[arg(long, default_value = "https://pages.example.com/landing")]
        url: String,
        /// Override the ingestion root (staging endpoints).
        #[arg(long)]
        graph_base: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show the tenant's settings record, server tokens included.
    Show,
    /// Update fields of the settings record. Unset flags keep their stored
    /// values; the record is replaced wholesale on the server.
    Set {
        /// RFC 3339 event date, e.g. 2025-11-19T22:00:00Z.
        #[arg(long)]
        event_date: Option<String>,
        /// Thank-you redirect URL.
        #[arg(long)]
        redirect_url: Option<String>,
        /// Embedded lead-form URL.
        #[arg(long)]
        form_url: Option<String>,
        /// Replace the pixel list with these specs
        /// (`vendor:external_id[:server_token]`, repeatable).
        #[arg(long = "pixel", value_name = "SPEC")]
        pixels: Vec<String>,
        /// Remove every configured pixel.
        #[arg(long, conflicts_with = "pixels")]
        clear_pixels: bool,
    },
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn vendor_line(family: &str, msg: &str) {
    println!("  {CYAN}{family:>7}{RESET}  {msg}");
}

fn compact(data: &CustomData) -> String {
    serde_json::to_string(&Value::Object(data.clone())).unwrap_or_default()
}

// ── HTTP client ──────────────────────────────────────────────────────

struct Client {
    http: reqwest::Client,
    addr: String,
    token: Option<String>,
}

impl Client {
    fn new(addr: String, token: Option<String>) -> Self {
        let http = reqwest::Client::new();
        Self { http, addr, token }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.addr)
    }

    fn auth_header(&self) -> Result<String> {
        self.token
            .clone()
            .map(|token| format!("Bearer {token}"))
            .ok_or_else(|| anyhow::anyhow!("no token provided — set SIGNALBOX_TOKEN or use --token"))
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let auth = self.auth_header()?;
        let resp = self
            .http
            .get(self.url(path))
            .header("Authorization", &auth)
            .send()
            .await
            .context("request failed")?;
        handle_response(resp).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let auth = self.auth_header()?;
        let resp = self
            .http
            .put(self.url(path))
            .header("Authorization", &auth)
            .json(body)
            .send()
            .await
            .context("request failed")?;
        handle_response(resp).await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let body = resp.text().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("failed to parse response JSON")
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let client = Client::new(cli.addr, cli.token);

    match run(client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(client: Client, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Settings { action } => cmd_settings(&client, action).await,
        Commands::Simulate {
            url,
            title,
            pixels,
            scroll,
            clicks,
            video_progress,
        } => cmd_simulate(&url, &title, &pixels, scroll, clicks, video_progress).await,
        Commands::MirrorTest {
            pixel_id,
            token,
            event,
            url,
            graph_base,
        } => cmd_mirror_test(&pixel_id, &token, &event, &url, graph_base.as_deref()).await,
    }
}

// ── Settings commands ────────────────────────────────────────────────

async fn cmd_settings(client: &Client, action: SettingsCommands) -> Result<()> {
    match action {
        SettingsCommands::Show => {
            let settings = fetch_settings(client).await?;
            print_settings(&settings);
            Ok(())
        }
        SettingsCommands::Set {
            event_date,
            redirect_url,
            form_url,
            pixels,
            clear_pixels,
        } => {
            let mut settings = fetch_settings(client).await?;

            if let Some(raw) = event_date {
                let parsed = chrono::DateTime::parse_from_rfc3339(&raw)
                    .context("event date must be RFC 3339, e.g. 2025-11-19T22:00:00Z")?;
                settings.event_date = Some(parsed.with_timezone(&chrono::Utc));
            }
            if let Some(url) = redirect_url {
                settings.redirect_url = Some(url);
            }
            if let Some(url) = form_url {
                settings.form_url = Some(url);
            }
            if clear_pixels {
                settings.pixels.clear();
            } else if !pixels.is_empty() {
                settings.pixels = parse_pixel_specs(&pixels)?;
            }

            client
                .put("/v1/admin/settings", &serde_json::to_value(&settings)?)
                .await?;

            println!();
            success("Settings replaced.");
            println!();
            print_settings(&settings);
            Ok(())
        }
    }
}

async fn fetch_settings(client: &Client) -> Result<PageSettings> {
    let value = client.get("/v1/admin/settings").await?;
    serde_json::from_value(value).context("unexpected settings payload")
}

fn print_settings(settings: &PageSettings) {
    header("⚙", "Landing Page Settings");

    let stored_date = settings
        .event_date
        .map_or_else(|| "(default)".to_owned(), |d| d.to_rfc3339());
    kv_line("Event date", &stored_date);
    kv_line(
        "Displays as",
        &format_date_pt(settings.effective_event_date(), DISPLAY_OFFSET_HOURS),
    );
    kv_line("Redirect URL", settings.effective_redirect_url());
    kv_line("Form URL", settings.effective_form_url());
    println!();

    if settings.pixels.is_empty() {
        println!("  {DIM}No pixels configured.{RESET}");
    }
    for pixel in &settings.pixels {
        let mirrored = pixel
            .server_token
            .as_deref()
            .is_some_and(|token| !token.is_empty());
        let suffix = if mirrored {
            format!("  {GREEN}mirrored{RESET}")
        } else {
            String::new()
        };
        kv_line(
            pixel.vendor.display_name(),
            &format!("{}{suffix}", pixel.external_id),
        );
    }
    println!();
}

// ── Simulation ───────────────────────────────────────────────────────

async fn cmd_simulate(
    url: &str,
    title: &str,
    specs: &[String],
    scroll: bool,
    clicks: u32,
    video_progress: Option<f64>,
) -> Result<()> {
    let pixels = if specs.is_empty() {
        demo_pixels()
    } else {
        parse_pixel_specs(specs)?
    };

    let page = PageContext::new(url)
        .context("invalid page URL")?
        .with_title(title)
        .with_referrer("https://social.example.com/feed")
        .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) SignalboxCLI/0.1")
        .with_language("pt-BR")
        .with_screen(1920, 1080)
        .with_viewport(1280, 720);

    println!();
    header("▶", "Page Session");
    kv_line("URL", url);
    kv_line("Pixels", &pixel_summary(&pixels));
    println!();

    let host = Arc::new(PrintingHost::default());
    let mirror = ConversionsMirror::new(Arc::new(PrintingTransport));
    let mut session = PageSession::new(host, mirror, page, pixels);

    session.open().await;
    flush_mirror_tasks().await;

    if scroll {
        println!();
        println!("  {DIM}visitor scrolls to 75% depth{RESET}");
        session
            .on_scroll(ScrollSample {
                scroll_y: 1800.0,
                scroll_height: 3200.0,
                viewport_height: 800.0,
            })
            .await;
        flush_mirror_tasks().await;
    }

    for n in 0..clicks {
        println!();
        println!("  {DIM}visitor clicks the call-to-action (click {}){RESET}", n + 1);
        session
            .on_click(ClickTarget {
                id: format!("cta-{n}"),
                class_name: String::new(),
                tag_name: "BUTTON".to_owned(),
                text: "Quero garantir minha vaga".to_owned(),
                href: None,
                offset_top: 420,
                offset_left: 16,
            })
            .await;
        flush_mirror_tasks().await;
    }

    if let Some(progress) = video_progress {
        println!();
        println!("  {DIM}visitor watches the video to {:.0}%{RESET}", progress * 100.0);
        session.register_video("demo-video");
        session.on_video(&video_signal(VideoSignalKind::Play));
        session.on_video(&video_signal(VideoSignalKind::Progress(progress)));
        if progress >= 1.0 {
            session.on_video(&video_signal(VideoSignalKind::Ended));
        }
        flush_mirror_tasks().await;
    }

    println!();
    success("Session complete.");
    println!();
    Ok(())
}

/// Mirror submissions run on spawned tasks; give them a beat to print
/// before the next phase starts.
async fn flush_mirror_tasks() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn video_signal(kind: VideoSignalKind) -> VideoSignal {
    VideoSignal {
        video_key: "demo-video".to_owned(),
        kind,
        title: "Apresentação do evento".to_owned(),
        src: "https://cdn.example.com/apresentacao.mp4".to_owned(),
    }
}

fn demo_pixels() -> Vec<PixelConfig> {
    vec![
        PixelConfig {
            id: "pixel-1".to_owned(),
            vendor: Vendor::SocialAds,
            external_id: "1234567890".to_owned(),
            server_token: Some("demo-token".to_owned()),
        },
        PixelConfig {
            id: "pixel-2".to_owned(),
            vendor: Vendor::SearchAds,
            external_id: "AW-1111111".to_owned(),
            server_token: None,
        },
        PixelConfig {
            id: "pixel-3".to_owned(),
            vendor: Vendor::WebAnalytics,
            external_id: "G-2222222".to_owned(),
            server_token: None,
        },
    ]
}

fn pixel_summary(pixels: &[PixelConfig]) -> String {
    let parts: Vec<String> = pixels
        .iter()
        .map(|p| format!("{} {}", p.vendor.display_name(), p.external_id))
        .collect();
    parts.join(", ")
}

// ── Printing host ────────────────────────────────────────────────────
//
// Stands in for the browser document: injected scripts install printing
// handles, and every vendor call is echoed to the terminal instead of a
// network.

#[derive(Default)]
struct PrintingHost {
    installed: Mutex<HashSet<ScriptKind>>,
}

impl ScriptHost for PrintingHost {
    fn inject(&self, kind: ScriptKind, bootstrap_id: &str) -> Result<(), ScriptError> {
        vendor_line("inject", &format!("{DIM}{}{RESET}", kind.src(bootstrap_id)));
        if let Ok(mut installed) = self.installed.lock() {
            installed.insert(kind);
        }
        Ok(())
    }

    fn script(&self) -> Option<Arc<dyn ScriptClient>> {
        self.installed
            .lock()
            .ok()?
            .contains(&ScriptKind::Social)
            .then(|| Arc::new(PrintingSocial) as Arc<dyn ScriptClient>)
    }

    fn tag(&self) -> Option<Arc<dyn TagClient>> {
        self.installed
            .lock()
            .ok()?
            .contains(&ScriptKind::Tag)
            .then(|| Arc::new(PrintingTag) as Arc<dyn TagClient>)
    }
}

struct PrintingSocial;

impl ScriptClient for PrintingSocial {
    fn loaded(&self) -> bool {
        true
    }

    fn init(&self, external_id: &str) -> Result<(), ScriptError> {
        vendor_line("social", &format!("init {external_id}"));
        Ok(())
    }

    fn track(&self, name: &str, data: &CustomData, dedupe_id: &str) {
        vendor_line(
            "social",
            &format!("track {name} {} {DIM}eventID={dedupe_id}{RESET}", compact(data)),
        );
    }

    fn track_custom(&self, name: &str, data: &CustomData, dedupe_id: &str) {
        vendor_line(
            "social",
            &format!(
                "trackCustom {name} {} {DIM}eventID={dedupe_id}{RESET}",
                compact(data)
            ),
        );
    }
}

struct PrintingTag;

impl TagClient for PrintingTag {
    fn config(&self, external_id: &str, params: &CustomData) {
        vendor_line("tag", &format!("config {external_id} {}", compact(params)));
    }

    fn event(&self, name: &str, params: &CustomData) {
        vendor_line("tag", &format!("event {name} {}", compact(params)));
    }
}

struct PrintingTransport;

#[async_trait::async_trait]
impl MirrorTransport for PrintingTransport {
    async fn post_events(&self, url: &str, body: &Value) -> Result<(), MirrorError> {
        vendor_line("mirror", &format!("POST {url}"));
        let pretty = serde_json::to_string_pretty(body).unwrap_or_default();
        for line in pretty.lines() {
            println!("           {DIM}{line}{RESET}");
        }
        Ok(())
    }

    async fn lookup_ip(&self) -> Option<String> {
        None
    }
}

// ── Mirror credential test ───────────────────────────────────────────

async fn cmd_mirror_test(
    pixel_id: &str,
    token: &str,
    event: &str,
    url: &str,
    graph_base: Option<&str>,
) -> Result<()> {
    let name = parse_event_name(event)?;
    let page = PageContext::new(url)
        .context("invalid source URL")?
        .with_title("Signalbox credential check")
        .with_user_agent("SignalboxCLI/0.1");
    let pixel = PixelConfig {
        id: "smoke-test".to_owned(),
        vendor: Vendor::SocialAds,
        external_id: pixel_id.to_owned(),
        server_token: Some(token.to_owned()),
    };
    let event = TrackingEvent::new(name, CustomData::new());

    let mut mirror = ConversionsMirror::new(Arc::new(HttpMirrorTransport::new()));
    if let Some(base) = graph_base {
        mirror = mirror.with_graph_base(base);
    }

    println!();
    header("⇄", "Conversions Mirror Test");
    kv_line("Pixel", pixel_id);
    kv_line("Event", name.social_name());
    kv_line("Event ID", &event.dedupe_id);
    println!();

    match mirror.deliver(&pixel, &event, &page).await {
        Ok(true) => {
            success("Endpoint accepted the event.");
            println!("  {DIM}Look for the event id above in the vendor's test-events view.{RESET}");
            println!();
            Ok(())
        }
        Ok(false) => bail!("the pixel carries no server token"),
        Err(err) => bail!("delivery failed: {err}"),
    }
}

// ── Pixel spec parsing ───────────────────────────────────────────────

fn parse_pixel_specs(specs: &[String]) -> Result<Vec<PixelConfig>> {
    specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| parse_pixel_spec(idx, spec))
        .collect()
}

/// Parse `vendor:external_id[:server_token]`.
fn parse_pixel_spec(idx: usize, spec: &str) -> Result<PixelConfig> {
    let mut parts = spec.splitn(3, ':');

    let vendor = match parts.next().unwrap_or_default() {
        "social" | "social_ads" => Vendor::SocialAds,
        "search" | "search_ads" => Vendor::SearchAds,
        "analytics" | "web_analytics" => Vendor::WebAnalytics,
        other => bail!(
            "unknown vendor '{other}' in pixel spec '{spec}' \
             (expected social_ads, search_ads, or web_analytics)"
        ),
    };

    let external_id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow::anyhow!("pixel spec '{spec}' is missing an external id"))?;

    let server_token = parts
        .next()
        .filter(|token| !token.is_empty())
        .map(str::to_owned);
    if server_token.is_some() && vendor != Vendor::SocialAds {
        bail!("only social_ads pixels take a server token (spec '{spec}')");
    }

    Ok(PixelConfig {
        id: format!("pixel-{}", idx + 1),
        vendor,
        external_id: external_id.to_owned(),
        server_token,
    })
}

fn parse_event_name(name: &str) -> Result<EventName> {
    Ok(match name {
        "page_view" => EventName::PageView,
        "scroll" => EventName::Scroll75,
        "click" => EventName::Click,
        "video_play" => EventName::VideoPlay,
        "video_25" => EventName::VideoView25,
        "video_50" => EventName::VideoView50,
        "video_75" => EventName::VideoView75,
        "video_complete" => EventName::VideoComplete,
        other => bail!(
            "unknown event '{other}' (expected page_view, scroll, click, video_play, \
             video_25, video_50, video_75, or video_complete)"
        ),
    })
}
