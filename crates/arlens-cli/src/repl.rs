//! REPL – Read-Eval-Print Loop driving a running [`Session`].
//!
//! Supported slash-commands:
//!   /help               – show this list
//!   /status             – heading, position, sensors and filters
//!   /frame              – compose and print the current overlay
//!   /genre [label]      – list genres or filter by one
//!   /radius <m>         – search radius (300, 500, 1000, 3000)
//!   /limit <n>          – result cap (10, 30, 50, 100)
//!   /rating <min|any>   – minimum rating for rated venues
//!   /unrated <on|off>   – show venues without a rating
//!   /open <on|off>      – hide venues known to be closed
//!   /zoom <x>           – set the magnification
//!   /select [id]        – open a drawn panel, or show the selection
//!   /clear              – close the detail view
//!   /quit | /exit       – stop the session and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arlens_runtime::{OverlayFrame, Session};
use arlens_types::{ArError, GENRES, GenreFilter, LIMIT_CHOICES, RADIUS_CHOICES, SensorKind};

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Frame,
    Genre(Option<GenreFilter>),
    Radius(f64),
    Limit(usize),
    Rating(Option<f32>),
    Unrated(bool),
    Open(bool),
    Zoom(f64),
    Select(Option<String>),
    Clear,
    Quit,
}

impl Command {
    /// Parse a trimmed, non-empty input line.
    pub fn parse(line: &str) -> Result<Self, ArError> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let arg = words.next();

        let cmd = match (name, arg) {
            ("/help", _) => Command::Help,
            ("/status", _) => Command::Status,
            ("/frame", _) => Command::Frame,
            ("/genre", None) => Command::Genre(None),
            ("/genre", Some(label)) => Command::Genre(Some(GenreFilter::parse(label)?)),
            ("/radius", Some(v)) => {
                let radius = parse_number::<f64>(v)?;
                if !RADIUS_CHOICES.contains(&radius) {
                    return Err(invalid(format!("radius must be one of {RADIUS_CHOICES:?}")));
                }
                Command::Radius(radius)
            }
            ("/limit", Some(v)) => {
                let limit = parse_number::<usize>(v)?;
                if !LIMIT_CHOICES.contains(&limit) {
                    return Err(invalid(format!("limit must be one of {LIMIT_CHOICES:?}")));
                }
                Command::Limit(limit)
            }
            ("/rating", Some("any")) => Command::Rating(None),
            ("/rating", Some(v)) => {
                let min = parse_number::<f32>(v)?;
                if !(0.0..=5.0).contains(&min) {
                    return Err(invalid("rating must be between 0 and 5".to_string()));
                }
                Command::Rating(Some(min))
            }
            ("/unrated", Some(v)) => Command::Unrated(parse_switch(v)?),
            ("/open", Some(v)) => Command::Open(parse_switch(v)?),
            ("/zoom", Some(v)) => {
                let x = parse_number::<f64>(v)?;
                if !x.is_finite() {
                    return Err(invalid("zoom must be a finite number".to_string()));
                }
                Command::Zoom(x)
            }
            ("/select", id) => Command::Select(id.map(str::to_string)),
            ("/clear", _) => Command::Clear,
            ("/quit" | "/exit", _) => Command::Quit,
            (
                "/radius" | "/limit" | "/rating" | "/unrated" | "/open" | "/zoom",
                None,
            ) => return Err(invalid(format!("{name} needs an argument"))),
            (other, _) => return Err(invalid(format!("unknown command '{other}'"))),
        };
        Ok(cmd)
    }
}

fn invalid(message: String) -> ArError {
    ArError::Config(message)
}

fn parse_number<T: std::str::FromStr>(v: &str) -> Result<T, ArError> {
    v.parse::<T>()
        .map_err(|_| invalid(format!("'{v}' is not a number")))
}

fn parse_switch(v: &str) -> Result<bool, ArError> {
    match v.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" => Ok(true),
        "off" | "no" | "false" => Ok(false),
        _ => Err(invalid(format!("expected on/off, got '{v}'"))),
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &mut Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_frame = Instant::now();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "arlens>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match Command::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{} Type {} for available commands.", e.to_string().red(), "/help".bold());
                continue;
            }
        };

        match cmd {
            Command::Help => cmd_help(),
            Command::Status => cmd_status(session),
            Command::Frame => {
                let dt = last_frame.elapsed().as_secs_f64();
                last_frame = Instant::now();
                print_frame(&session.frame(dt));
            }
            Command::Genre(None) => {
                for genre in GENRES {
                    println!("  • {genre}");
                }
            }
            Command::Genre(Some(genre)) => {
                session.update_filters(|f| f.genre = genre);
                println!("  {} genre filter updated", "✓".green());
            }
            Command::Radius(radius) => {
                session.update_filters(|f| f.radius_m = radius);
                println!("  {} radius set to {radius} m", "✓".green());
            }
            Command::Limit(limit) => {
                session.update_filters(|f| f.limit = limit);
                println!("  {} showing at most {limit} venues", "✓".green());
            }
            Command::Rating(min) => {
                session.update_filters(|f| f.min_rating = min);
                match min {
                    Some(min) => println!("  {} minimum rating {min:.1}", "✓".green()),
                    None => println!("  {} rating threshold off", "✓".green()),
                }
            }
            Command::Unrated(on) => {
                session.update_filters(|f| f.include_unrated = on);
                println!("  {} unrated venues {}", "✓".green(), on_off(on));
            }
            Command::Open(on) => {
                session.update_filters(|f| f.only_open = on);
                println!("  {} open-only {}", "✓".green(), on_off(on));
            }
            Command::Zoom(x) => {
                let zoom = session.zoom().set(x);
                println!("  {} zoom ×{:.2}", "✓".green(), zoom.magnification());
            }
            Command::Select(Some(id)) => {
                if session.tap(&id) {
                    print_selection(session);
                } else {
                    println!("  {} '{}' is not on screen; run /frame first", "✗".red(), id.yellow());
                }
            }
            Command::Select(None) => print_selection(session),
            Command::Clear => {
                session.clear_selection();
                println!("  {} selection cleared", "✓".green());
            }
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn cmd_help() {
    println!();
    println!("  {}", "Available commands:".bold());
    for (cmd, desc) in [
        ("/status", "Heading, position, sensors and filters"),
        ("/frame", "Compose and print the current overlay"),
        ("/genre [label]", "List genres or filter by one"),
        ("/radius <m>", "Search radius (300, 500, 1000, 3000)"),
        ("/limit <n>", "Result cap (10, 30, 50, 100)"),
        ("/rating <min|any>", "Minimum rating for rated venues"),
        ("/unrated <on|off>", "Show venues without a rating"),
        ("/open <on|off>", "Hide venues known to be closed"),
        ("/zoom <x>", "Set the magnification (1–5)"),
        ("/select [id]", "Open a drawn panel, or show the selection"),
        ("/clear", "Close the detail view"),
        ("/quit", "Stop the session and exit"),
    ] {
        println!("    {:<20} {}", cmd.cyan(), desc);
    }
    println!();
}

fn cmd_status(session: &mut Session) {
    let world = session.world();
    let availability = world.availability();
    let filters = session.filters();

    println!();
    println!("  {:<12} {:.1}°", "Heading".bold(), world.stabilized_heading());
    println!("  {:<12} {:.1}°", "Pitch".bold(), world.current_pitch());
    match world.position() {
        Some(p) => println!("  {:<12} {:.5}, {:.5}", "Position".bold(), p.latitude, p.longitude),
        None => println!("  {:<12} {}", "Position".bold(), "waiting for fix".yellow()),
    }
    for kind in [SensorKind::Orientation, SensorKind::Rotation, SensorKind::Position] {
        let state = if availability.get(kind) {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!("  {:<12} {kind:?} {state}", "Sensor".bold());
    }
    println!(
        "  {:<12} {} (request #{})",
        "Venues".bold(),
        session.points().len(),
        session.fetcher().latest_sequence()
    );
    println!(
        "  {:<12} genre={} radius={}m limit={} open-only={} min-rating={} unrated={}",
        "Filters".bold(),
        String::from(filters.genre),
        filters.radius_m,
        filters.limit,
        on_off(filters.only_open),
        filters
            .min_rating
            .map_or_else(|| "any".to_string(), |r| format!("{r:.1}")),
        on_off(filters.include_unrated),
    );
    println!("  {:<12} ×{:.2}", "Zoom".bold(), session.zoom().current().magnification());
    println!();
}

fn print_selection(session: &Session) {
    match session.selected() {
        Some(poi) => {
            println!();
            println!("  {} {}", poi.name.bold(), format!("[{}]", poi.id).dimmed());
            println!("    {:<10} {}", "Genre", poi.genre);
            println!("    {:<10} {}", "Address", poi.address);
            if let Some(rating) = poi.rating {
                println!("    {:<10} {rating:.1}", "Rating");
            }
            if let Some(open) = poi.is_open {
                println!("    {:<10} {}", "Open", if open { "yes".green() } else { "no".red() });
            }
            if !poi.open_hours.is_empty() {
                println!("    {:<10} {}", "Hours", poi.open_hours);
            }
            if !poi.catch_copy.is_empty() {
                println!("    {}", poi.catch_copy.italic());
            }
            println!();
        }
        None => println!("  {}", "Nothing selected.".dimmed()),
    }
}

/// Print one overlay frame, back-to-front.
pub fn print_frame(frame: &OverlayFrame) {
    println!(
        "  {} heading {:.1}° zoom ×{:.2} – {} panel(s)",
        "▸".cyan(),
        frame.heading_deg,
        frame.zoom.magnification(),
        frame.panels.len()
    );
    for p in &frame.panels {
        let marker = if p.panel.emphasized { "★".yellow() } else { " ".normal() };
        println!(
            "    {marker} {:<6} {:<24} {:>6.0} m  x={:>6.1}% y={:>5.1}% scale={:.2} α={:.2} z={}",
            p.id,
            p.name,
            p.distance_m,
            p.panel.screen_x,
            p.panel.screen_y,
            p.panel.scale,
            p.panel.opacity,
            p.panel.z_index
        );
    }
}
