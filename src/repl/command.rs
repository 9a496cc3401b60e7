use chumsky::{
    prelude::*,
    text::{self, ascii::ident},
};

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryView {
    /// The latest `n` events, or everything retained
    Latest(Option<usize>),
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // INSERT key...
    Insert(Vec<String>),

    // DELETE key...
    Delete(Vec<String>),

    // SEARCH key
    Search(String),

    // SHOW
    Show,

    // STATS
    Stats,

    // SEQ
    Sequence,

    // HISTORY [n | JSON]
    History(HistoryView),

    // SAMPLE
    Sample,

    // RESET
    Reset,

    // ORDER n
    Order(usize),

    // HELP
    Help,

    // QUIT | EXIT
    Quit,
}

pub const HELP: &str = "\
commands:
  insert <key>...   insert one or more keys
  delete <key>...   delete one or more keys
  search <key>      locate a key
  show              draw the tree level by level
  stats             height, node count and key bounds
  seq               all keys in ascending order
  history [n|json]  recent events, or the whole history as JSON
  sample            load the sample tree
  reset             drop every key
  order <n>         start over with a new fanout
  help              this text
  quit | exit       leave";

/// Case-insensitive keyword
fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, (), extra::Err<Rich<'a, char>>> + Clone {
    ident().try_map(move |s: &str, span| {
        if s.eq_ignore_ascii_case(word) {
            Ok(())
        } else {
            Err(Rich::custom(span, format!("expected '{word}'")))
        }
    })
}

/// Any run of non-blank characters; keys are checked by the session
fn key<'a>() -> impl Parser<'a, &'a str, String, extra::Err<Rich<'a, char>>> + Clone {
    any()
        .filter(|c: &char| !c.is_whitespace())
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
}

fn number<'a>() -> impl Parser<'a, &'a str, usize, extra::Err<Rich<'a, char>>> + Clone {
    text::int(10).try_map(|s: &str, span| {
        s.parse::<usize>()
            .map_err(|e| Rich::custom(span, format!("invalid number '{s}': {e}")))
    })
}

pub fn parser<'a>() -> impl Parser<'a, &'a str, Command, extra::Err<Rich<'a, char>>> {
    let keys = key().padded().repeated().at_least(1).collect::<Vec<String>>();

    let insert = keyword("insert")
        .ignore_then(keys.clone())
        .map(Command::Insert);

    let delete = keyword("delete")
        .ignore_then(keys)
        .map(Command::Delete);

    let search = keyword("search")
        .ignore_then(key().padded())
        .map(Command::Search);

    let history = keyword("history")
        .ignore_then(
            choice((
                keyword("json").to(HistoryView::Json),
                number().map(|n| HistoryView::Latest(Some(n))),
            ))
            .padded()
            .or_not(),
        )
        .map(|view| Command::History(view.unwrap_or(HistoryView::Latest(None))));

    let order = keyword("order")
        .ignore_then(number().padded())
        .map(Command::Order);

    choice((
        insert,
        delete,
        search,
        history,
        order,
        keyword("show").to(Command::Show),
        keyword("stats").to(Command::Stats),
        keyword("seq").to(Command::Sequence),
        keyword("sample").to(Command::Sample),
        keyword("reset").to(Command::Reset),
        keyword("help").to(Command::Help),
        keyword("quit").or(keyword("exit")).to(Command::Quit),
    ))
    .padded()
    .then_ignore(end())
}

/// Parse one input line, joining any parse errors into a single message
pub fn parse(line: &str) -> Result<Command, String> {
    parser().parse(line).into_result().map_err(|errors| {
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })
}
