use std::{borrow::Cow, collections::BTreeSet, convert::TryFrom, fmt};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

const COMMENT_PREFIX: &str = "#";
const ASSIGNMENT_OPERATOR: &str = "=";
const EXPORT_PREFIX: &str = "export ";

/// Classification of a single physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
  Blank,
  Comment,
  Export,
  KeyValue,
}

impl LineKind {
  /// Whether lines of this kind may carry a key.
  pub fn is_assignment(self) -> bool {
    matches!(self, LineKind::Export | LineKind::KeyValue)
  }
}

/// A parsed env file: one [`EnvLine`] per physical line, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvFile<'a> {
  pub lines: Vec<EnvLine<'a>>,
}

impl<'a> fmt::Display for EnvFile<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for line in &self.lines {
      write!(f, "{}", line)?;
    }
    Ok(())
  }
}

impl<'a> TryFrom<&'a str> for EnvFile<'a> {
  type Error = ParseError;

  fn try_from(s: &'a str) -> Result<Self, Self::Error> {
    #[cfg(feature = "tracing")]
    debug!("Parsing env file with {} lines", s.lines().count());

    validate(s)?;

    let lines: Vec<EnvLine> = s
      .split_inclusive('\n')
      .enumerate()
      .map(|(index, raw)| EnvLine::classify(raw, index + 1))
      .collect();

    #[cfg(feature = "tracing")]
    debug!("Parsed {} lines", lines.len());

    Ok(Self { lines })
  }
}

impl<'a> EnvFile<'a> {
  /// Lines that define a non-empty key.
  pub fn assignments(&self) -> impl Iterator<Item = &EnvLine<'a>> {
    self.lines.iter().filter(|line| {
      line.kind.is_assignment() && line.key.as_deref().is_some_and(|key| !key.is_empty())
    })
  }

  /// Distinct keys in lexicographic order.
  pub fn keys(&self) -> BTreeSet<&str> {
    self.assignments().filter_map(EnvLine::key).collect()
  }

  /// Distinct keys in order of first appearance.
  pub fn ordered_keys(&self) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    self
      .assignments()
      .filter_map(EnvLine::key)
      .filter(|key| seen.insert(*key))
      .collect()
  }

  /// Returns the last line defining `key`, matching how later definitions
  /// override earlier ones when the file is loaded.
  pub fn get(&self, key: &str) -> Option<&EnvLine<'a>> {
    self.assignments().filter(|line| line.key() == Some(key)).last()
  }

  pub fn value_of(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(EnvLine::value)
  }

  /// True when the file is empty or its last line is newline-terminated.
  pub fn ends_with_newline(&self) -> bool {
    self.lines.last().is_none_or(|line| line.raw.ends_with('\n'))
  }

  pub fn into_owned(self) -> EnvFile<'static> {
    EnvFile {
      lines: self.lines.into_iter().map(EnvLine::into_owned).collect(),
    }
  }
}

/// Rejects content where a non-blank, non-comment line neither starts with
/// `export ` nor contains `=`.
fn validate(s: &str) -> Result<(), ParseError> {
  for (index, line) in s.lines().enumerate() {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
      continue;
    }
    if !line.contains(ASSIGNMENT_OPERATOR) && !trimmed.starts_with(EXPORT_PREFIX) {
      return Err(ParseError::MissingAssignment { line: index + 1 });
    }
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvLine<'a> {
  /// Original text including its line terminator, if any.
  pub raw: Cow<'a, str>,
  /// 1-based line number.
  pub number: usize,
  pub kind: LineKind,
  pub key: Option<Cow<'a, str>>,
  pub value: Option<Cow<'a, str>>,
  pub comment: Option<EnvComment<'a>>,
}

impl<'a> fmt::Display for EnvLine<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl<'a> EnvLine<'a> {
  /// Classifies one physical line. `raw` keeps its terminator.
  pub fn classify(raw: &'a str, number: usize) -> Self {
    #[cfg(feature = "tracing")]
    trace!("Parsing line {}: {:?}", number, raw);

    let line = raw.trim_end_matches(['\n', '\r']);
    let trimmed = line.trim();

    let mut parsed = EnvLine {
      raw: Cow::Borrowed(raw),
      number,
      kind: LineKind::Blank,
      key: None,
      value: None,
      comment: None,
    };

    if trimmed.is_empty() {
      return parsed;
    }

    if trimmed.starts_with(COMMENT_PREFIX) {
      parsed.kind = LineKind::Comment;
      parsed.comment = Some(EnvComment(Cow::Borrowed(line)));
      return parsed;
    }

    let body = match trimmed.strip_prefix(EXPORT_PREFIX) {
      Some(rest) => {
        parsed.kind = LineKind::Export;
        rest
      }
      None => {
        parsed.kind = LineKind::KeyValue;
        line
      }
    };

    // Split on the first '#', quoted or not.
    let assignment = match body.find(COMMENT_PREFIX) {
      Some(hash_pos) => {
        parsed.comment = Some(EnvComment(Cow::Borrowed(&body[hash_pos..])));
        body[..hash_pos].trim_end()
      }
      None => body,
    };

    if let Some((key, value)) = assignment.split_once(ASSIGNMENT_OPERATOR) {
      parsed.key = Some(Cow::Borrowed(key.trim()));
      parsed.value = Some(Cow::Borrowed(value.trim()));

      #[cfg(feature = "tracing")]
      trace!(
        "Parsed variable: key={}, has_inline_comment={}",
        key.trim(),
        parsed.comment.is_some()
      );
    }

    parsed
  }

  pub fn key(&self) -> Option<&str> {
    self.key.as_deref()
  }

  pub fn value(&self) -> Option<&str> {
    self.value.as_deref()
  }

  pub fn into_owned(self) -> EnvLine<'static> {
    EnvLine {
      raw: Cow::Owned(self.raw.into_owned()),
      number: self.number,
      kind: self.kind,
      key: self.key.map(|key| Cow::Owned(key.into_owned())),
      value: self.value.map(|value| Cow::Owned(value.into_owned())),
      comment: self.comment.map(EnvComment::into_owned),
    }
  }
}

/// Comment text, starting at its `#` and without the line terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvComment<'a>(Cow<'a, str>);

impl<'a> fmt::Display for EnvComment<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'a> EnvComment<'a> {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn into_owned(self) -> EnvComment<'static> {
    EnvComment(Cow::Owned(self.0.into_owned()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
  #[error("Syntax error on line {line}: Missing '='")]
  MissingAssignment { line: usize },
}

impl ParseError {
  /// 1-based number of the offending line.
  pub fn line(&self) -> usize {
    match self {
      ParseError::MissingAssignment { line } => *line,
    }
  }
}
