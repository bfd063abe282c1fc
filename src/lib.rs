//! Regular expressions evaluated as sets of remaining suffixes.
//!
//! A pattern is parsed into a tree of [`Acceptor`] nodes.  Instead of
//! tracking a single cursor, every node answers one question: *given this
//! input, which suffixes can remain after consuming a match of me at the
//! very start?*  The answer is a [`SuffixSet`].
//!
//! ```text
//! pattern  ──parse──>  Vec<Acceptor> (a top-level sequence)  ──accept──>  SuffixSet
//! ```
//!
//! Composite nodes combine the sets of their children:
//!
//! * a sequence flat-maps each element over the suffixes left by the
//!   previous one,
//! * an alternation unions both branches (neither side short-circuits),
//! * repetitions iterate the child over the suffixes reached so far.
//!
//! Because every branch is carried forward as a set, there is no
//! backtracking and no automaton.  The cost is recomputation: nothing is
//! memoised per `(node, suffix)` pair, so pathological patterns on long
//! inputs can take super-linear time.
//!
//! # Matching semantics
//!
//! [`Regexp::is_match`] is **prefix-based**: the pattern matches if it can
//! consume *some* prefix of the input (possibly empty).  The empty pattern
//! therefore matches every input, and `x*` matches `"y"`.
//!
//! # Pattern syntax
//!
//! | Token        | Meaning                                                   |
//! |--------------|-----------------------------------------------------------|
//! | `.`          | any single byte in `1..=127`                              |
//! | `\x`         | the byte `x`, literally                                   |
//! | `[...]`      | class; leading `]` literal, `a-z` range, edge `-` literal |
//! | `X*` `X+` `X?` | zero-or-more / one-or-more / zero-or-one of atom `X`    |
//! | `X{m,n}`     | between `m` and `n` repetitions of `X`, inclusive         |
//! | `A\|B`       | everything before vs. everything after, lowest precedence |
//!
//! Quantifiers bind to the single node immediately before them.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A syntax error found while parsing a pattern.
///
/// Positions are byte offsets into the whole pattern, including errors
/// raised on the right-hand side of an alternation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// `*`, `+`, `?` or `{` with nothing before it to repeat.
    DanglingQuantifier { quantifier: char, position: usize },
    /// A `{` not followed by `min,max}`.
    InvalidBound { position: usize },
    /// A `[` with no closing `]`.
    UnterminatedClass { position: usize },
    /// A `\` as the last byte of the pattern.
    TrailingEscape { position: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingQuantifier {
                quantifier,
                position,
            } => {
                write!(
                    f,
                    "quantifier '{}' at position {} has nothing to repeat",
                    quantifier, position
                )
            }
            Self::InvalidBound { position } => {
                write!(
                    f,
                    "invalid repetition bound at position {}: expected {{min,max}}",
                    position
                )
            }
            Self::UnterminatedClass { position } => {
                write!(f, "unterminated character class opened at position {}", position)
            }
            Self::TrailingEscape { position } => {
                write!(f, "trailing escape at position {}", position)
            }
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Suffix set
// ---------------------------------------------------------------------------

/// An unordered set of distinct suffixes of one input.
///
/// Suffixes are borrowed from the input, so a set never outlives the
/// bytes it was computed from.  Iteration order is unspecified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuffixSet<'a> {
    suffixes: HashSet<&'a [u8]>,
}

impl<'a> SuffixSet<'a> {
    /// An empty set: "no match possible here".
    pub fn new() -> Self {
        Self::default()
    }

    /// The set holding exactly `suffix`.
    pub fn single(suffix: &'a [u8]) -> Self {
        let mut set = Self::new();
        set.add(suffix);
        set
    }

    /// Insert `suffix`, returning `true` if it was not already present.
    pub fn add(&mut self, suffix: &'a [u8]) -> bool {
        self.suffixes.insert(suffix)
    }

    pub fn contains(&self, suffix: &[u8]) -> bool {
        self.suffixes.contains(suffix)
    }

    /// Merge every member of `other` into `self`.
    pub fn union(&mut self, other: SuffixSet<'a>) {
        if self.suffixes.is_empty() {
            // Keep whichever allocation is already populated.
            self.suffixes = other.suffixes;
        } else {
            self.suffixes.extend(other.suffixes);
        }
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.suffixes.iter().copied()
    }

    /// The shortest member, i.e. the one left by the longest match.
    pub fn shortest(&self) -> Option<&'a [u8]> {
        self.iter().min_by_key(|suffix| suffix.len())
    }
}

impl<'a> FromIterator<&'a [u8]> for SuffixSet<'a> {
    fn from_iter<I: IntoIterator<Item = &'a [u8]>>(iter: I) -> Self {
        Self {
            suffixes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for SuffixSet<'a> {
    type Item = &'a [u8];
    type IntoIter = std::collections::hash_set::IntoIter<&'a [u8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.suffixes.into_iter()
    }
}

impl<'s, 'a> IntoIterator for &'s SuffixSet<'a> {
    type Item = &'a [u8];
    type IntoIter = std::iter::Copied<std::collections::hash_set::Iter<'s, &'a [u8]>>;

    fn into_iter(self) -> Self::IntoIter {
        self.suffixes.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Matcher tree
// ---------------------------------------------------------------------------

/// A node of the matcher tree.
///
/// Every composite variant owns its children exclusively; the tree is
/// built once by the parser and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acceptor {
    /// `.`: any byte in `1..=127`.
    AnyByte,
    /// A single literal byte.
    Byte(u8),
    /// Any byte in `lo..=hi`.  Never matches when `lo > hi`.
    Range { lo: u8, hi: u8 },
    /// `X?`
    Optional(Box<Acceptor>),
    /// `X*`
    ZeroOrMore(Box<Acceptor>),
    /// `X+`
    OneOrMore(Box<Acceptor>),
    /// `X{min,max}`.  Never matches when `min > max`.
    Bounded {
        inner: Box<Acceptor>,
        min: usize,
        max: usize,
    },
    /// Concatenation.  The empty sequence matches without consuming.
    Sequence(Vec<Acceptor>),
    /// `A|B`. Both sides are always evaluated.
    Alternation(Box<Acceptor>, Box<Acceptor>),
}

impl Acceptor {
    /// The distinct suffixes of `input` left after consuming a match of
    /// this node at the start of `input`.  Empty means no match.
    pub fn accept<'a>(&self, input: &'a [u8]) -> SuffixSet<'a> {
        match self {
            Acceptor::AnyByte => accept_byte(input, |b| b != 0 && b < 0x80),
            Acceptor::Byte(expected) => accept_byte(input, |b| b == *expected),
            Acceptor::Range { lo, hi } => accept_byte(input, |b| (*lo..=*hi).contains(&b)),
            Acceptor::Optional(inner) => {
                let mut out = SuffixSet::single(input);
                out.union(inner.accept(input));
                out
            }
            Acceptor::ZeroOrMore(inner) => closure(inner, input),
            Acceptor::OneOrMore(inner) => {
                // One mandatory repetition, then the star closure from
                // every suffix it leaves.
                let mut out = SuffixSet::new();
                for suffix in inner.accept(input) {
                    out.union(closure(inner, suffix));
                }
                out
            }
            Acceptor::Bounded { inner, min, max } => bounded(inner, *min, *max, input),
            Acceptor::Sequence(nodes) => accept_sequence(nodes, input),
            Acceptor::Alternation(left, right) => {
                let mut out = left.accept(input);
                out.union(right.accept(input));
                out
            }
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Acceptor> {
        match self {
            Acceptor::AnyByte | Acceptor::Byte(_) | Acceptor::Range { .. } => Vec::new(),
            Acceptor::Optional(inner)
            | Acceptor::ZeroOrMore(inner)
            | Acceptor::OneOrMore(inner)
            | Acceptor::Bounded { inner, .. } => vec![&**inner],
            Acceptor::Sequence(nodes) => nodes.iter().collect(),
            Acceptor::Alternation(left, right) => vec![&**left, &**right],
        }
    }

    /// Number of nodes in the subtree rooted here, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Acceptor::node_count)
            .sum::<usize>()
    }

    /// Dot-graph label for this node alone.
    fn label(&self) -> String {
        match self {
            Acceptor::AnyByte => ".".to_string(),
            Acceptor::Byte(b) => b.escape_ascii().to_string(),
            Acceptor::Range { lo, hi } => {
                format!("[{}-{}]", lo.escape_ascii(), hi.escape_ascii())
            }
            Acceptor::Optional(_) => "?".to_string(),
            Acceptor::ZeroOrMore(_) => "*".to_string(),
            Acceptor::OneOrMore(_) => "+".to_string(),
            Acceptor::Bounded { min, max, .. } => format!("{{{},{}}}", min, max),
            Acceptor::Sequence(_) => "seq".to_string(),
            Acceptor::Alternation(..) => "|".to_string(),
        }
    }

    fn write_dot(&self, buffer: &mut impl Write, next_id: &mut usize) -> std::io::Result<usize> {
        let id = *next_id;
        *next_id += 1;
        writeln!(buffer, "\t{} [label=\"{}\"];", id, self.label())?;
        for child in self.children() {
            let child_id = child.write_dot(buffer, next_id)?;
            writeln!(buffer, "\t{} -> {};", id, child_id)?;
        }
        Ok(id)
    }

    /// Write `self` as the operand of a postfix quantifier.
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceptor::Sequence(nodes) if nodes.len() != 1 => write!(f, "({})", self),
            Acceptor::Alternation(..) => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

/// Renders a pattern-like form of the tree.  Groups are shown with
/// parentheses, which the parser itself does not accept.
impl fmt::Display for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceptor::AnyByte => write!(f, "."),
            Acceptor::Byte(b) if META.contains(b) => write!(f, "\\{}", *b as char),
            Acceptor::Byte(b) => write!(f, "{}", b.escape_ascii()),
            Acceptor::Range { lo, hi } => {
                write!(f, "[{}-{}]", lo.escape_ascii(), hi.escape_ascii())
            }
            Acceptor::Optional(inner) => {
                inner.fmt_operand(f)?;
                write!(f, "?")
            }
            Acceptor::ZeroOrMore(inner) => {
                inner.fmt_operand(f)?;
                write!(f, "*")
            }
            Acceptor::OneOrMore(inner) => {
                inner.fmt_operand(f)?;
                write!(f, "+")
            }
            Acceptor::Bounded { inner, min, max } => {
                inner.fmt_operand(f)?;
                write!(f, "{{{},{}}}", min, max)
            }
            Acceptor::Sequence(nodes) => {
                for node in nodes {
                    match node {
                        Acceptor::Alternation(..) => write!(f, "({})", node)?,
                        _ => write!(f, "{}", node)?,
                    }
                }
                Ok(())
            }
            Acceptor::Alternation(left, right) => write!(f, "{}|{}", left, right),
        }
    }
}

/// Bytes with a syntactic meaning outside a class.
const META: &[u8] = b".*+?|{}[]\\";

/// Consume one byte satisfying `pred`.
#[inline]
fn accept_byte(input: &[u8], pred: impl FnOnce(u8) -> bool) -> SuffixSet<'_> {
    match input.split_first() {
        Some((&b, rest)) if pred(b) => SuffixSet::single(rest),
        _ => SuffixSet::new(),
    }
}

/// Breadth-first closure of `inner` from `input`: every suffix reachable
/// by zero or more repetitions.  Each suffix is queued at most once, so
/// this terminates after at most `input.len() + 1` rounds.
fn closure<'a>(inner: &Acceptor, input: &'a [u8]) -> SuffixSet<'a> {
    let mut seen = SuffixSet::single(input);
    let mut queue = VecDeque::from([input]);
    while let Some(current) = queue.pop_front() {
        for next in inner.accept(current) {
            if seen.add(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Suffixes reachable by exactly `k` repetitions of `inner`, unioned over
/// `k` in `min..=max`.
///
/// Depth `k + 1` is recomputed from all of depth `k`; results of
/// `inner.accept` are not cached per suffix.
fn bounded<'a>(inner: &Acceptor, min: usize, max: usize, input: &'a [u8]) -> SuffixSet<'a> {
    let mut out = SuffixSet::new();
    let mut depth = SuffixSet::single(input);
    if min == 0 {
        out.union(depth.clone());
    }
    for k in 1..=max {
        let mut next = SuffixSet::new();
        for suffix in &depth {
            next.union(inner.accept(suffix));
        }
        depth = next;
        if depth.is_empty() {
            break;
        }
        if k >= min {
            out.union(depth.clone());
        }
    }
    out
}

/// Left-to-right flat-map of `nodes` over the suffixes each one leaves.
///
/// Folds over the sequence with a frontier set, so stack depth does not
/// grow with the number of nodes.
fn accept_sequence<'a>(nodes: &[Acceptor], input: &'a [u8]) -> SuffixSet<'a> {
    let mut frontier = SuffixSet::single(input);
    for node in nodes {
        let mut next = SuffixSet::new();
        for suffix in &frontier {
            next.union(node.accept(suffix));
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Recursive-descent parser over the pattern bytes.
struct Parser<'p> {
    pattern: &'p [u8],
    pos: usize,
}

impl<'p> Parser<'p> {
    fn new(pattern: &'p str) -> Self {
        Self {
            pattern: pattern.as_bytes(),
            pos: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = *self.pattern.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Parse up to the end of the pattern.
    ///
    /// On `|` the rest of the pattern is parsed by a recursive call and the
    /// sequence built so far becomes the left side of a single alternation.
    fn parse_sequence(&mut self) -> Result<Vec<Acceptor>, Error> {
        let mut out = Vec::new();
        while let Some(b) = self.next_byte() {
            let at = self.pos - 1;
            match b {
                b'.' => out.push(Acceptor::AnyByte),
                b'*' => wrap_last(&mut out, b, at, Acceptor::ZeroOrMore)?,
                b'+' => wrap_last(&mut out, b, at, Acceptor::OneOrMore)?,
                b'?' => wrap_last(&mut out, b, at, Acceptor::Optional)?,
                b'|' => {
                    let right = self.parse_sequence()?;
                    let left = std::mem::take(&mut out);
                    out.push(Acceptor::Alternation(
                        Box::new(Acceptor::Sequence(left)),
                        Box::new(Acceptor::Sequence(right)),
                    ));
                    break;
                }
                b'{' => {
                    if out.is_empty() {
                        return Err(Error::DanglingQuantifier {
                            quantifier: '{',
                            position: at,
                        });
                    }
                    let (min, max) = self.parse_bounds(at)?;
                    wrap_last(&mut out, b, at, |inner| Acceptor::Bounded { inner, min, max })?;
                }
                b'[' => out.push(self.parse_class(at)?),
                b'\\' => {
                    let escaped = self
                        .next_byte()
                        .ok_or(Error::TrailingEscape { position: at })?;
                    out.push(Acceptor::Byte(escaped));
                }
                _ => out.push(Acceptor::Byte(b)),
            }
        }
        Ok(out)
    }

    /// Parse `min,max}` after a `{` at `open`.
    fn parse_bounds(&mut self, open: usize) -> Result<(usize, usize), Error> {
        let invalid = || Error::InvalidBound { position: open };
        let rest = &self.pattern[self.pos..];
        let close = rest.iter().position(|&b| b == b'}').ok_or_else(invalid)?;
        let body = std::str::from_utf8(&rest[..close]).map_err(|_| invalid())?;
        let (min, max) = body.split_once(',').ok_or_else(invalid)?;
        let parse_count = |s: &str| {
            let s = s.trim_start();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            s.parse::<usize>().map_err(|_| invalid())
        };
        let bounds = (parse_count(min)?, parse_count(max)?);
        self.pos += close + 1;
        Ok(bounds)
    }

    /// Parse a character class body after a `[` at `open`.
    ///
    /// A leading `]` is a member rather than the terminator, so `[]` is
    /// never an empty class.  Members fold left to right into
    /// alternations: `[abc]` is `(a|b)|c`.
    fn parse_class(&mut self, open: usize) -> Result<Acceptor, Error> {
        let unterminated = Error::UnterminatedClass { position: open };
        let rest = &self.pattern[self.pos..];
        let skip = usize::from(rest.first() == Some(&b']'));
        let end = match rest[skip..].iter().position(|&b| b == b']') {
            Some(i) => i + skip,
            None => return Err(unterminated),
        };
        let body = &rest[..end];
        self.pos += end + 1;

        let mut members = Vec::new();
        let mut i = 0;
        while i < body.len() {
            // `x-y` needs a byte after the hyphen; a hyphen at either edge
            // falls through as a literal.
            if i + 2 < body.len() && body[i + 1] == b'-' {
                members.push(Acceptor::Range {
                    lo: body[i],
                    hi: body[i + 2],
                });
                i += 3;
            } else {
                members.push(Acceptor::Byte(body[i]));
                i += 1;
            }
        }
        members
            .into_iter()
            .reduce(|lhs, rhs| Acceptor::Alternation(Box::new(lhs), Box::new(rhs)))
            .ok_or(unterminated)
    }
}

/// Pop the last node, wrap it in a quantifier, push it back.
fn wrap_last(
    out: &mut Vec<Acceptor>,
    quantifier: u8,
    position: usize,
    wrap: impl FnOnce(Box<Acceptor>) -> Acceptor,
) -> Result<(), Error> {
    let last = out.pop().ok_or(Error::DanglingQuantifier {
        quantifier: quantifier as char,
        position,
    })?;
    out.push(wrap(Box::new(last)));
    Ok(())
}

// ---------------------------------------------------------------------------
// Compiled pattern
// ---------------------------------------------------------------------------

/// A compiled pattern: the top-level sequence of matcher nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Regexp {
    pattern: String,
    nodes: Vec<Acceptor>,
}

/// Compile `pattern`.  Any syntax error aborts compilation.
pub fn parse(pattern: &str) -> Result<Regexp, Error> {
    let nodes = Parser::new(pattern).parse_sequence()?;
    Ok(Regexp {
        pattern: pattern.to_string(),
        nodes,
    })
}

impl Regexp {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        parse(pattern)
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// The top-level sequence.
    pub fn nodes(&self) -> &[Acceptor] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        1 + self.nodes.iter().map(Acceptor::node_count).sum::<usize>()
    }

    /// Every suffix of `input` that can remain after the whole pattern
    /// matches a prefix of it.
    pub fn accept<'a>(&self, input: &'a [u8]) -> SuffixSet<'a> {
        accept_sequence(&self.nodes, input)
    }

    /// `true` if the pattern matches some prefix of `input`.
    pub fn is_match(&self, input: impl AsRef<[u8]>) -> bool {
        !self.accept(input.as_ref()).is_empty()
    }

    /// The longest prefix of `input` the pattern can consume, or `None`
    /// if it does not match.
    pub fn longest_match<'a>(&self, input: &'a [u8]) -> Option<&'a [u8]> {
        let rest = self.accept(input).shortest()?;
        Some(&input[..input.len() - rest.len()])
    }

    /// Emit a Graphviz DOT representation of the matcher tree.
    pub fn to_dot(&self, mut buffer: impl Write) -> std::io::Result<()> {
        writeln!(buffer, "digraph regexp {{")?;
        let mut next_id = 0;
        let root_id = next_id;
        next_id += 1;
        writeln!(buffer, "\t{} [label=\"seq\"];", root_id)?;
        for node in &self.nodes {
            let child_id = node.write_dot(&mut buffer, &mut next_id)?;
            writeln!(buffer, "\t{} -> {};", root_id, child_id)?;
        }
        writeln!(buffer, "}}")
    }
}

impl FromStr for Regexp {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Self, Error> {
        parse(pattern)
    }
}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}
