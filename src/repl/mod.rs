//! Interactive front end driving one tree per session.
//!
//! A line goes through [`command::parse`], runs against the engine, and comes
//! back as text: the events the command produced and, when it changed the
//! tree, the new level view.

pub mod command;
pub mod render;

use crate::bplus::BPlusTree;
use crate::btree::BTree;
use crate::config::{TreeConfig, Variant};
use crate::error::{TreeError, TreeResult};
use crate::event::EventKind;
use crate::tree::{SearchTree, TreeKey};

pub use command::{Command, HistoryView};

/// What the driver loop should do after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

/// Keys typed at the prompt
pub trait SessionKey: TreeKey + Sized {
    fn parse_key(raw: &str) -> Result<Self, String>;
}

/// The B-tree session works on single letters, upper-cased
impl SessionKey for char {
    fn parse_key(raw: &str) -> Result<Self, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
            _ => Err(format!("'{raw}' is not a single letter A-Z")),
        }
    }
}

/// The B+ tree session works on non-negative integers
impl SessionKey for i64 {
    fn parse_key(raw: &str) -> Result<Self, String> {
        match raw.parse::<i64>() {
            Ok(value) if value >= 0 => Ok(value),
            _ => Err(format!("'{raw}' is not a non-negative integer")),
        }
    }
}

#[derive(Debug)]
pub enum Engine {
    BTree(BTree<char>),
    BPlus(BPlusTree<i64>),
}

impl Engine {
    fn build(config: &TreeConfig) -> TreeResult<Self> {
        Ok(match config.variant {
            Variant::BTree => Engine::BTree(config.build_btree()?),
            Variant::BPlus => Engine::BPlus(config.build_bplus()?),
        })
    }
}

#[derive(Debug)]
pub struct Session {
    config: TreeConfig,
    engine: Engine,
}

impl Session {
    pub fn new(config: TreeConfig) -> TreeResult<Self> {
        config.validate()?;
        let engine = Engine::build(&config)?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn execute(&mut self, line: &str) -> Flow {
        let command = match command::parse(line) {
            Ok(command) => command,
            Err(message) => return Flow::Continue(format!("parse error: {message}")),
        };

        match command {
            Command::Quit => Flow::Quit,
            Command::Help => Flow::Continue(command::HELP.to_string()),
            Command::Order(fanout) => Flow::Continue(self.change_fanout(fanout)),
            Command::Sample => Flow::Continue(self.load_sample()),
            other => Flow::Continue(match &mut self.engine {
                Engine::BTree(tree) => run(tree, other),
                Engine::BPlus(tree) => run(tree, other),
            }),
        }
    }

    /// Run one command per line, skipping blank lines and `#` comments.
    /// Returns the echoed commands interleaved with their output.
    pub fn replay(&mut self, script: &str) -> Vec<String> {
        let mut transcript = Vec::new();
        for line in script.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            transcript.push(format!(">> {line}"));
            match self.execute(line) {
                Flow::Continue(output) => transcript.push(output),
                Flow::Quit => break,
            }
        }
        transcript
    }

    /// Start over with a new fanout; the old tree and its history go away
    fn change_fanout(&mut self, fanout: usize) -> String {
        let config = self.config.clone().with_fanout(fanout);
        match config.validate().and_then(|_| Engine::build(&config)) {
            Ok(engine) => {
                self.config = config;
                self.engine = engine;
                tracing::info!(fanout, "session restarted with a new fanout");
                format!("new {} with fanout {fanout}", self.stats_variant())
            }
            Err(err) => format!("error: {err}"),
        }
    }

    fn load_sample(&mut self) -> String {
        match &mut self.engine {
            Engine::BTree(tree) => {
                let mark = tree.events().mark();
                tree.load_sample();
                self.config.fanout = tree.min_degree();
                after_change(tree, mark)
            }
            Engine::BPlus(tree) => {
                let mark = tree.events().mark();
                let outcome = tree.load_sample();
                let mut out = after_change(tree, mark);
                if let Err(err) = outcome {
                    out.push_str(&format!("\nerror: {err}"));
                }
                out
            }
        }
    }

    fn stats_variant(&self) -> &'static str {
        match &self.engine {
            Engine::BTree(tree) => tree.stats().variant,
            Engine::BPlus(tree) => tree.stats().variant,
        }
    }
}

/// Run a command that works the same on either engine
fn run<K: SessionKey, T: SearchTree<K>>(tree: &mut T, command: Command) -> String {
    let mark = tree.events().mark();

    match command {
        Command::Insert(raw) => {
            let failures: Vec<String> = parse_keys::<K, T>(tree, &raw)
                .into_iter()
                .filter_map(|key| unexpected(tree.insert(key)))
                .collect();
            with_failures(after_change(tree, mark), failures)
        }
        Command::Delete(raw) => {
            let failures: Vec<String> = parse_keys::<K, T>(tree, &raw)
                .into_iter()
                .filter_map(|key| unexpected(tree.delete(&key)))
                .collect();
            with_failures(after_change(tree, mark), failures)
        }
        Command::Search(raw) => {
            let failures: Vec<String> = parse_keys::<K, T>(tree, &[raw])
                .pop()
                .and_then(|key| unexpected(tree.find(&key)))
                .into_iter()
                .collect();
            with_failures(new_events(tree, mark), failures)
        }
        Command::Reset => {
            tree.reset();
            after_change(tree, mark)
        }
        Command::Show => draw(tree),
        Command::Stats => render::stats_table(&tree.stats()).to_string(),
        Command::Sequence => match tree.ordered_keys() {
            Ok(keys) => crate::tree::bracketed(&keys),
            Err(err) => format!("error: {err}"),
        },
        Command::History(HistoryView::Latest(n)) => {
            let events = tree.events();
            let n = n.unwrap_or(events.len());
            render::events_table(events.latest(n)).to_string()
        }
        Command::History(HistoryView::Json) => match tree.events().to_json() {
            Ok(json) => json,
            Err(err) => format!("error: {err}"),
        },
        Command::Sample | Command::Order(_) | Command::Help | Command::Quit => String::new(),
    }
}

/// Keys that pass the session's input rules; the rest become `error` events
fn parse_keys<K: SessionKey, T: SearchTree<K>>(tree: &mut T, raw: &[String]) -> Vec<K> {
    raw.iter()
        .filter_map(|text| match K::parse_key(text) {
            Ok(key) => Some(key),
            Err(message) => {
                tree.events_mut().record(EventKind::Error, message);
                None
            }
        })
        .collect()
}

/// Duplicate and missing keys are already on the event stream; any other
/// failure is a broken tree and goes into the output
fn unexpected<T>(result: TreeResult<T>) -> Option<String> {
    match result {
        Ok(_) | Err(TreeError::DuplicateKey(_)) | Err(TreeError::KeyNotFound(_)) => None,
        Err(err) => Some(format!("error: {err}")),
    }
}

fn with_failures(mut output: String, failures: Vec<String>) -> String {
    for failure in failures {
        output.push('\n');
        output.push_str(&failure);
    }
    output
}

fn new_events<K: TreeKey, T: SearchTree<K>>(tree: &T, mark: usize) -> String {
    render::events_table(tree.events().since(mark)).to_string()
}

fn draw<K: TreeKey, T: SearchTree<K>>(tree: &T) -> String {
    match tree.levels() {
        Ok(levels) => render::levels(&levels),
        Err(err) => format!("error: {err}"),
    }
}

fn after_change<K: TreeKey, T: SearchTree<K>>(tree: &T, mark: usize) -> String {
    format!("{}\n{}", new_events(tree, mark), draw(tree))
}
