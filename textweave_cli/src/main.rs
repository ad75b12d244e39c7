//! Command line driver: load a file into the store, apply a few tags,
//! drive the cooperative scheduler to quiescence and print layout
//! statistics.

use anyhow::Context;
use clap::Parser;
use once_cell::sync::OnceCell;
use textweave_core::index::motion::CountKind;
use textweave_core::log;
use textweave_core::opt::{StoreOptions, ViewOptions, WrapOption};
use textweave_core::store::{StoreEvent, TextStore};
use textweave_core::view::ScrollWhat;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

#[derive(Debug, Parser)]
#[command(
  name = "textweave",
  about = "Load a text file into the textweave engine and report layout metrics."
)]
struct Cli {
  /// File to load; stdin is not read, a small sample is used when
  /// omitted.
  file: Option<std::path::PathBuf>,

  /// Viewport width in pixels.
  #[arg(long, default_value_t = 640)]
  width: usize,

  /// Viewport height in pixels.
  #[arg(long, default_value_t = 480)]
  height: usize,

  /// Wrap mode: none, char or word.
  #[arg(long, default_value = "char")]
  wrap: WrapOption,

  /// Tag every line matching this literal as "hit" and elide it.
  #[arg(long)]
  elide_containing: Option<String>,
}

fn main() -> anyhow::Result<()> {
  let _ = LOG_GUARD.set(log::init());
  let cli = Cli::parse();

  let text = match &cli.file {
    Some(path) => std::fs::read_to_string(path)
      .with_context(|| format!("reading {}", path.display()))?,
    None => "hello textweave\nthe quick brown fox\tjumps over\nthe lazy dog\n"
      .to_string(),
  };

  let opts = StoreOptions::builder().wrap(cli.wrap).build();
  let mut store = TextStore::new(opts);
  let viewer = store.add_viewer(
    ViewOptions::builder()
      .width(cli.width)
      .height(cli.height)
      .build(),
  );

  store.insert("1.0", &text)?;
  info!(lines = store.line_count(), "text loaded");

  if let Some(needle) = &cli.elide_containing {
    let mut attrs = textweave_core::tag::TagAttrs::default();
    attrs.elide = Some(true);
    store.tag_configure("hit", attrs);
    let mut lineno = 1;
    for line in text.lines() {
      if line.contains(needle.as_str()) {
        store.tag_add(
          "hit",
          &format!("{lineno}.0"),
          &format!("{}.0", lineno + 1),
        )?;
      }
      lineno += 1;
    }
  }

  // Let the async height updater catch up, then report.
  store.run_until_quiescent();
  for event in store.take_events() {
    if let StoreEvent::ViewSync { in_sync, .. } = event {
      info!(in_sync, "view sync");
    }
  }

  let end = store.parse_index(viewer, "end")?;
  let start = store.parse_index(viewer, "1.0")?;
  let chars = store.count_chars(start, end, CountKind::Chars);
  println!("lines:        {}", store.line_count());
  println!("characters:   {chars}");
  println!("total pixels: {}", store.total_pixels(viewer));
  println!("end index:    {}", store.format_index(end));

  store.yview_scroll(viewer, 2, ScrollWhat::Units);
  let (first, last) = store.yview_fractions(viewer);
  println!("yview:        {first:.4} {last:.4}");

  store.remove_viewer(viewer);
  Ok(())
}
