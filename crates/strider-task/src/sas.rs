//! Line-oriented SAS+ text format (Fast Downward translator output).
//!
//! The format is a sequence of keyword-delimited sections: version, metric,
//! variables, optional mutex groups, initial state, goal, and operators.
//! Parsing is purely syntactic; range checks against variable domains live
//! in [`crate::validate`].

use crate::task::{MutexGroup, Operator, PrePost, Task, VarVal, Variable};
use smallvec::SmallVec;
use thiserror::Error;

/// A SAS+ parse error, carrying the 1-based line it was detected on.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected '{expected}', found '{found}'")]
    Expected {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("line {line}: unexpected end of input while reading {context}")]
    UnexpectedEof { line: usize, context: &'static str },

    #[error("line {line}: not an integer: '{text}'")]
    NotAnInteger { line: usize, text: String },

    #[error("line {line}: malformed {what} row")]
    BadRow { line: usize, what: &'static str },

    #[error("line {line}: value {value} outside the representable range")]
    ValueRange { line: usize, value: i64 },
}

impl ParseError {
    /// Process exit code for input-parse failures.
    pub fn exit_code(&self) -> i32 {
        10
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// Cursor over trimmed input lines.
struct Lines<'a> {
    lines: Vec<&'a str>,
    idx: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().map(str::trim).collect(),
            idx: 0,
        }
    }

    /// 1-based number of the line about to be read.
    fn line_no(&self) -> usize {
        self.idx + 1
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.idx).copied()
    }

    fn next(&mut self, context: &'static str) -> Result<&'a str> {
        let line = self.peek().ok_or(ParseError::UnexpectedEof {
            line: self.line_no(),
            context,
        })?;
        self.idx += 1;
        Ok(line)
    }

    fn expect(&mut self, keyword: &'static str) -> Result<()> {
        let line_no = self.line_no();
        let found = self.next(keyword)?;
        if found != keyword {
            return Err(ParseError::Expected {
                line: line_no,
                expected: keyword,
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn next_int(&mut self, context: &'static str) -> Result<i64> {
        let line_no = self.line_no();
        let text = self.next(context)?;
        text.parse().map_err(|_| ParseError::NotAnInteger {
            line: line_no,
            text: text.to_string(),
        })
    }
}

/// Narrow an i64 read from the input into a domain value.
fn to_val(v: i64, line: usize) -> Result<u16> {
    u16::try_from(v).map_err(|_| ParseError::ValueRange { line, value: v })
}

/// Parse a `"var val"` row.
fn parse_pair(line: &str, line_no: usize, what: &'static str) -> Result<VarVal> {
    let mut it = line.split_whitespace();
    let parse = |tok: Option<&str>| -> Result<i64> {
        tok.ok_or(ParseError::BadRow {
            line: line_no,
            what,
        })?
        .parse()
        .map_err(|_| ParseError::BadRow {
            line: line_no,
            what,
        })
    };
    let var = parse(it.next())?;
    let val = parse(it.next())?;
    if var < 0 {
        return Err(ParseError::ValueRange {
            line: line_no,
            value: var,
        });
    }
    Ok((var as usize, to_val(val, line_no)?))
}

/// Parse the canonical SAS+ layout into a [`Task`].
///
/// Accepts the mutex section both with an explicit group count and as a
/// bare run of `begin_mutex_group` blocks. Trailing content after the last
/// operator (the file-final sentinel line) is ignored.
pub fn parse_sas(text: &str) -> Result<Task> {
    let mut c = Lines::new(text);

    c.expect("begin_version")?;
    let version = c.next_int("version")? as i32;
    c.expect("end_version")?;

    c.expect("begin_metric")?;
    let metric = c.next_int("metric")? as i32;
    c.expect("end_metric")?;

    let nvars = c.next_int("variable count")?;
    if nvars < 0 {
        return Err(ParseError::ValueRange {
            line: c.line_no() - 1,
            value: nvars,
        });
    }
    let nvars = nvars as usize;

    let mut vars = Vec::with_capacity(nvars);
    for _ in 0..nvars {
        c.expect("begin_variable")?;
        let name = c.next("variable name")?.to_string();
        // Axiom layer; ignored (axioms are not supported by the engines).
        c.next_int("axiom layer")?;
        let dom_line = c.line_no();
        let domain_size = to_val(c.next_int("domain size")?, dom_line)?;
        for _ in 0..domain_size {
            c.next("variable atom")?;
        }
        c.expect("end_variable")?;
        vars.push(Variable { name, domain_size });
    }

    // Mutex section: either "<count>" followed by that many groups, or a
    // bare run of groups, or nothing at all.
    let mut mutexes = Vec::new();
    if let Some(line) = c.peek() {
        if line != "begin_state" {
            if let Ok(count) = line.parse::<i64>() {
                c.idx += 1;
                for _ in 0..count.max(0) {
                    mutexes.push(parse_mutex_group(&mut c)?);
                }
            }
            while c.peek() == Some("begin_mutex_group") {
                mutexes.push(parse_mutex_group(&mut c)?);
            }
        }
    }

    c.expect("begin_state")?;
    let mut init = Vec::with_capacity(nvars);
    for _ in 0..nvars {
        let line_no = c.line_no();
        init.push(to_val(c.next_int("initial state value")?, line_no)?);
    }
    c.expect("end_state")?;

    c.expect("begin_goal")?;
    let ngoal = c.next_int("goal count")?;
    let mut goal = Vec::with_capacity(ngoal.max(0) as usize);
    for _ in 0..ngoal.max(0) {
        let line_no = c.line_no();
        let row = c.next("goal row")?;
        goal.push(parse_pair(row, line_no, "goal")?);
    }
    c.expect("end_goal")?;

    let mut ops = Vec::new();
    while let Some(line) = c.peek() {
        if line == "begin_operator" {
            c.idx += 1;
            ops.push(parse_operator(&mut c)?);
        } else {
            // Blank lines and the trailing axiom-count sentinel.
            c.idx += 1;
        }
    }

    Ok(Task {
        version,
        metric,
        vars,
        init,
        goal,
        ops,
        mutexes,
    })
}

fn parse_mutex_group(c: &mut Lines<'_>) -> Result<MutexGroup> {
    c.expect("begin_mutex_group")?;
    let count = c.next_int("mutex literal count")?;
    let mut lits = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count.max(0) {
        let line_no = c.line_no();
        let row = c.next("mutex row")?;
        lits.push(parse_pair(row, line_no, "mutex")?);
    }
    c.expect("end_mutex_group")?;
    Ok(MutexGroup { lits })
}

fn parse_operator(c: &mut Lines<'_>) -> Result<Operator> {
    let name = c.next("operator name")?.to_string();

    let nprevail = c.next_int("prevail count")?;
    let mut prevail = Vec::with_capacity(nprevail.max(0) as usize);
    for _ in 0..nprevail.max(0) {
        let line_no = c.line_no();
        let row = c.next("prevail row")?;
        prevail.push(parse_pair(row, line_no, "prevail")?);
    }

    let npre_post = c.next_int("pre_post count")?;
    let mut pre_posts = SmallVec::with_capacity(npre_post.max(0) as usize);
    for _ in 0..npre_post.max(0) {
        let line_no = c.line_no();
        let row = c.next("pre_post row")?;
        pre_posts.push(parse_pre_post(row, line_no)?);
    }

    let cost = c.next_int("operator cost")? as f64;
    c.expect("end_operator")?;

    Ok(Operator {
        name,
        prevail,
        pre_posts,
        cost,
    })
}

/// A pre_post row is `<c> (<cv> <cval>)*c <var> <pre> <post>` on one line.
fn parse_pre_post(row: &str, line_no: usize) -> Result<PrePost> {
    let bad = || ParseError::BadRow {
        line: line_no,
        what: "pre_post",
    };
    let mut it = row.split_whitespace().map(|tok| tok.parse::<i64>());
    let mut next = || -> Result<i64> { it.next().ok_or_else(bad)?.map_err(|_| bad()) };

    let nconds = next()?;
    let mut conds = SmallVec::new();
    for _ in 0..nconds.max(0) {
        let cv = next()?;
        let cval = next()?;
        if cv < 0 {
            return Err(ParseError::ValueRange {
                line: line_no,
                value: cv,
            });
        }
        conds.push((cv as usize, to_val(cval, line_no)?));
    }

    let var = next()?;
    if var < 0 {
        return Err(ParseError::ValueRange {
            line: line_no,
            value: var,
        });
    }
    let pre = next()?;
    let post = next()?;
    let pre = if pre < 0 {
        None
    } else {
        Some(to_val(pre, line_no)?)
    };

    Ok(PrePost {
        conds,
        var: var as usize,
        pre,
        post: to_val(post, line_no)?,
    })
}
