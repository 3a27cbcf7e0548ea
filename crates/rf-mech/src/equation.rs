//! Reaction equation strings, e.g. `2 OH (+M) <=> H2O2 (+M)`.
//!
//! Grammar: terms `[coef] NAME` joined by `+`; arrows `<=>` or `=` for
//! reversible and `=>` for irreversible reactions; `+ M` marks a generic
//! third body and `(+M)` / `(+NAME)` a falloff collider.

use crate::error::{MechError, MechResult};
use regex::Regex;
use std::sync::LazyLock;

static FALLOFF_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*\+\s*([A-Za-z][A-Za-z0-9_\-*']*)\s*\)").expect("falloff marker pattern")
});

static TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+(?:\.\d*)?|\.\d+)\s*)?([A-Za-z][A-Za-z0-9_\-()*,']*)$")
        .expect("stoichiometric term pattern")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Collider {
    None,
    /// `+ M` on both sides
    ThirdBody,
    /// `(+M)` when `None`, `(+NAME)` for a single collider species
    Falloff(Option<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedEquation {
    pub reactants: Vec<(String, f64)>,
    pub products: Vec<(String, f64)>,
    pub reversible: bool,
    pub collider: Collider,
}

pub fn parse_equation(equation: &str) -> MechResult<ParsedEquation> {
    let err = |what: &str| MechError::Equation {
        equation: equation.to_string(),
        what: what.to_string(),
    };

    let (lhs, rhs, reversible) = if let Some((l, r)) = equation.split_once("<=>") {
        (l, r, true)
    } else if let Some((l, r)) = equation.split_once("=>") {
        (l, r, false)
    } else if let Some((l, r)) = equation.split_once('=') {
        (l, r, true)
    } else {
        return Err(err("missing arrow"));
    };
    if rhs.contains('=') {
        return Err(err("more than one arrow"));
    }

    let (lhs, lhs_falloff) = strip_falloff(lhs);
    let (rhs, rhs_falloff) = strip_falloff(rhs);
    if lhs_falloff != rhs_falloff {
        return Err(err("falloff collider must appear on both sides"));
    }

    let (reactants, lhs_m) = parse_side(&lhs).map_err(|w| err(&w))?;
    let (products, rhs_m) = parse_side(&rhs).map_err(|w| err(&w))?;
    if lhs_m != rhs_m {
        return Err(err("third body 'M' must appear on both sides"));
    }
    if reactants.is_empty() || products.is_empty() {
        return Err(err("both sides need at least one species"));
    }

    let collider = match (lhs_falloff, lhs_m) {
        (Some(_), true) => return Err(err("cannot combine '+ M' with '(+M)'")),
        (Some(c), false) => Collider::Falloff(if c == "M" { None } else { Some(c) }),
        (None, true) => Collider::ThirdBody,
        (None, false) => Collider::None,
    };

    Ok(ParsedEquation {
        reactants,
        products,
        reversible,
        collider,
    })
}

fn strip_falloff(side: &str) -> (String, Option<String>) {
    match FALLOFF_MARKER.captures(side) {
        Some(caps) => {
            let collider = caps[1].to_string();
            (FALLOFF_MARKER.replace(side, "").into_owned(), Some(collider))
        }
        None => (side.to_string(), None),
    }
}

/// Terms of one side plus whether a bare `M` was present.
fn parse_side(side: &str) -> Result<(Vec<(String, f64)>, bool), String> {
    let mut terms: Vec<(String, f64)> = Vec::new();
    let mut third_body = false;
    for raw in side.split('+') {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty term".to_string());
        }
        let caps = TERM
            .captures(raw)
            .ok_or_else(|| format!("malformed term '{raw}'"))?;
        let coef = match caps.get(1) {
            Some(m) => m
                .as_str()
                .parse::<f64>()
                .map_err(|e| format!("bad coefficient in '{raw}': {e}"))?,
            None => 1.0,
        };
        let name = &caps[2];
        if name == "M" {
            if caps.get(1).is_some() || third_body {
                return Err("third body 'M' must appear once without coefficient".to_string());
            }
            third_body = true;
            continue;
        }
        match terms.iter_mut().find(|(n, _)| n == name) {
            Some((_, c)) => *c += coef,
            None => terms.push((name.to_string(), coef)),
        }
    }
    Ok((terms, third_body))
}
