//! Parser for the ensemble model text format.
//!
//! The format is line-based: `;` starts a comment, `[info]` opens the
//! provenance section of `key = value` lines, and each `[tree:N]` section
//! lists its arena nodes in index order:
//!
//! ```text
//! [tree:0]
//! split = 0:Of_CoherenceRel:0.35:1:2:L
//! leaf = 1:22.0
//! leaf = 2:71.5
//! ```
//!
//! A split line is `index:feature:threshold:left:right:default`, where
//! `default` is `L` or `R` and names the branch taken when the feature is
//! absent or failed. Child indices must point forward, so every path
//! terminates by construction.

use crate::error::QualityError;
use crate::model::{content_hash, Ensemble, Node, Tree};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{digit1, space0};
use nom::combinator::{map_res, rest, value};
use nom::number::complete::double;
use nom::{IResult, Parser};
use std::str::FromStr;
use tracing::warn;

impl FromStr for Ensemble {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ensemble = Ensemble {
            name: String::new(),
            trainer: String::new(),
            description: String::new(),
            version: String::new(),
            trees: Vec::new(),
            hash: content_hash(s),
        };

        enum Section {
            None,
            Info,
            Tree,
        }
        let mut section = Section::None;
        let mut pending: Vec<(u32, Node)> = Vec::new();
        let mut open_trees = 0usize;

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if line == "[info]" {
                section = Section::Info;
                continue;
            }
            if line.starts_with('[') {
                let index = run_parser(parse_tree_header, line)
                    .map_err(|e| QualityError::Parse(format!("bad section header `{line}`: {e}")))?;
                if index as usize != open_trees {
                    return Err(QualityError::Parse(format!(
                        "tree sections must be sequential, expected [tree:{open_trees}], got [tree:{index}]"
                    )));
                }
                if open_trees > 0 {
                    ensemble.trees.push(finalize_tree(std::mem::take(&mut pending), open_trees - 1)?);
                }
                open_trees += 1;
                section = Section::Tree;
                continue;
            }

            let (name, val) = run_parser(parse_named_value, line)
                .map_err(|e| QualityError::Parse(format!("bad line `{line}`: {e}")))?;

            match (&section, name) {
                (Section::Info, "name") => ensemble.name = val.to_string(),
                (Section::Info, "trainer") => ensemble.trainer = val.to_string(),
                (Section::Info, "description") => ensemble.description = val.to_string(),
                (Section::Info, "version") => ensemble.version = val.to_string(),
                (Section::Tree, "split") => {
                    let node = run_parser(parse_split, val)
                        .map_err(|e| QualityError::Parse(format!("bad split `{val}`: {e}")))?;
                    pending.push(node);
                }
                (Section::Tree, "leaf") => {
                    let node = run_parser(parse_leaf, val)
                        .map_err(|e| QualityError::Parse(format!("bad leaf `{val}`: {e}")))?;
                    pending.push(node);
                }
                (Section::None, _) => {
                    return Err(QualityError::Parse(format!(
                        "unexpected line outside any section: {line}"
                    )));
                }
                _ => {
                    warn!("skip unknown named value: {name} = {val}");
                }
            }
        }

        if open_trees > 0 {
            ensemble.trees.push(finalize_tree(pending, open_trees - 1)?);
        }
        if ensemble.trees.is_empty() {
            return Err(QualityError::Parse("model contains no trees".to_string()));
        }
        Ok(ensemble)
    }
}

/// Runs a nom parser over a full line fragment, requiring it to consume
/// everything.
fn run_parser<'a, O>(
    mut parser: impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
    input: &'a str,
) -> Result<O, String> {
    match parser.parse(input) {
        Ok(("", output)) => Ok(output),
        Ok((remaining, _)) => Err(format!("trailing input `{remaining}`")),
        Err(e) => Err(e.to_string()),
    }
}

/// Validates and assembles one tree's arena from its `(index, node)` lines.
fn finalize_tree(pending: Vec<(u32, Node)>, tree_index: usize) -> Result<Tree, QualityError> {
    if pending.is_empty() {
        return Err(QualityError::Parse(format!("tree {tree_index} has no nodes")));
    }
    let len = pending.len() as u32;
    let mut nodes = Vec::with_capacity(pending.len());
    for (position, (index, node)) in pending.into_iter().enumerate() {
        if index != position as u32 {
            return Err(QualityError::Parse(format!(
                "tree {tree_index}: node indices must be contiguous from 0, got {index} at position {position}"
            )));
        }
        if let Node::Split { threshold, left, right, .. } = &node {
            if !threshold.is_finite() {
                return Err(QualityError::Parse(format!(
                    "tree {tree_index}: non-finite threshold at node {index}"
                )));
            }
            for child in [*left, *right] {
                if child <= index || child >= len {
                    return Err(QualityError::Parse(format!(
                        "tree {tree_index}: node {index} references invalid child {child}"
                    )));
                }
            }
        }
        if let Node::Leaf { value } = &node {
            if !value.is_finite() {
                return Err(QualityError::Parse(format!(
                    "tree {tree_index}: non-finite leaf value at node {index}"
                )));
            }
        }
        nodes.push(node);
    }
    Ok(Tree { nodes })
}

fn parse_named_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, (name, _, _, _, val)) =
        (take_while1(|c: char| c.is_ascii_alphanumeric()), space0, tag("="), space0, rest)
            .parse(input)?;
    Ok((input, (name, val.trim())))
}

fn parse_tree_header(input: &str) -> IResult<&str, u32> {
    let (input, (_, index, _)) = (tag("[tree:"), node_index, tag("]")).parse(input)?;
    Ok((input, index))
}

fn node_index(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>()).parse(input)
}

fn feature_id(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn default_branch(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag("L")), value(false, tag("R")))).parse(input)
}

fn parse_split(input: &str) -> IResult<&str, (u32, Node)> {
    let (input, (index, _, feature, _, threshold, _, left, _, right, _, default_left)) = (
        node_index,
        tag(":"),
        feature_id,
        tag(":"),
        double,
        tag(":"),
        node_index,
        tag(":"),
        node_index,
        tag(":"),
        default_branch,
    )
        .parse(input)?;
    Ok((
        input,
        (index, Node::Split { feature: feature.to_string(), threshold, left, right, default_left }),
    ))
}

fn parse_leaf(input: &str) -> IResult<&str, (u32, Node)> {
    let (input, (index, _, leaf_value)) = (node_index, tag(":"), double).parse(input)?;
    Ok((input, (index, Node::Leaf { value: leaf_value })))
}
