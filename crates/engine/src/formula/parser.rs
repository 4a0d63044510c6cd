// Formula parser - converts formula strings into AST
// Supports: numbers, string literals, error literals, cell refs (A1, Sheet1!A1, 'My Sheet'!A1),
// unary +/-, basic math (+, -, *, /), concatenation (&) and parentheses

use bigdecimal::BigDecimal;

use crate::cell_error::ErrorKind;
use crate::number;

/// Expression AST.
///
/// Literal and reference nodes keep the text they were written with so the
/// formula can be printed back without drifting from what the user typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number { text: String, value: BigDecimal },
    Text(String),
    Error(ErrorKind),
    CellRef(CellRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Concat, // &
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// A cell reference as written, e.g. `b2` or `'My Sheet'!B2`.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRef {
    pub sheet: Option<SheetName>,
    /// Address text in its original spelling
    pub addr: String,
}

/// Sheet prefix of a reference. `name` never includes the quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetName {
    pub name: String,
    pub quoted: bool,
}

/// One entry of a formula's reference list, uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Same-sheet reference: cell text
    Local(String),
    /// Cross-sheet reference: (sheet name, cell text)
    Sheet(String, String),
}

/// A successfully parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    pub expr: Expr,
    pub refs: Vec<Reference>,
}

/// Parse formula text (including the leading `=`).
pub fn parse(formula: &str) -> Result<ParsedFormula, String> {
    let formula = formula.trim();
    let input = formula
        .strip_prefix('=')
        .ok_or_else(|| "Formula must start with =".to_string())?;

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    check_depth(&tokens)?;

    let (expr, pos) = parse_expression(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(format!("Unexpected token: {}", tokens[pos].describe()));
    }

    let refs = extract_references(&expr);
    Ok(ParsedFormula { expr, refs })
}

/// Most parentheses that may be open at once.
const MAX_NESTING: usize = 256;
/// Most operators and parentheses in one formula. Every one of them can add a
/// level to the tree, and evaluation walks the tree recursively.
const MAX_DEPTH: usize = 1024;

fn check_depth(tokens: &[Token]) -> Result<(), String> {
    let mut open = 0usize;
    let mut nodes = 0usize;
    for token in tokens {
        match token {
            Token::LParen => {
                open += 1;
                nodes += 1;
                if open > MAX_NESTING {
                    return Err(format!("Formula nests more than {} parentheses", MAX_NESTING));
                }
            }
            Token::RParen => open = open.saturating_sub(1),
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Ampersand => nodes += 1,
            _ => {}
        }
        if nodes > MAX_DEPTH {
            return Err(format!("Formula has more than {} operators", MAX_DEPTH));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    StringLit(String),
    ErrorLit(ErrorKind),
    CellRef(String),
    /// Sheet name prefix (e.g., "Sheet1" from "Sheet1!A1"), '!' already consumed
    SheetPrefix(SheetName),
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(text) => text.clone(),
            Token::StringLit(s) => format!("\"{}\"", s),
            Token::ErrorLit(kind) => kind.as_str().to_string(),
            Token::CellRef(addr) => addr.clone(),
            Token::SheetPrefix(sheet) => format!("{}!", sheet.name),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Ampersand => "&".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '&' => { tokens.push(Token::Ampersand); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            '"' => {
                // String literal, no escapes
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '\'' => {
                // Quoted sheet name (e.g., 'My Sheet'!A1)
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\'')) => break,
                        Some((_, ch)) => name.push(ch),
                        None => return Err("Unterminated sheet name".to_string()),
                    }
                }
                skip_whitespace(&mut chars);
                if !matches!(chars.next(), Some((_, '!'))) {
                    return Err("Quoted sheet name must be followed by !".to_string());
                }
                tokens.push(Token::SheetPrefix(SheetName { name, quoted: true }));
            }
            '#' => {
                let rest = &input[start..];
                let kind = ErrorKind::ALL
                    .into_iter()
                    .find(|kind| {
                        rest.get(..kind.as_str().len())
                            .is_some_and(|head| head.eq_ignore_ascii_case(kind.as_str()))
                    })
                    .ok_or_else(|| format!("Invalid error literal: {}", rest))?;
                for _ in 0..kind.as_str().chars().count() {
                    chars.next();
                }
                tokens.push(Token::ErrorLit(kind));
            }
            'A'..='Z' | 'a'..='z' | '_' => {
                // Either a cell reference (A1) or a sheet prefix (Sheet1!)
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let mut lookahead = chars.clone();
                skip_whitespace(&mut lookahead);
                if let Some(&(_, '!')) = lookahead.peek() {
                    lookahead.next();
                    chars = lookahead;
                    tokens.push(Token::SheetPrefix(SheetName { name: ident, quoted: false }));
                } else if is_cell_ref_text(&ident) {
                    tokens.push(Token::CellRef(ident));
                } else {
                    return Err(format!("Unknown identifier: {}", ident));
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(&(_, '.')) = chars.peek() {
                    num_str.push('.');
                    chars.next();
                    while let Some(&(_, d)) = chars.peek() {
                        if d.is_ascii_digit() {
                            num_str.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                if num_str == "." {
                    return Err("Invalid number: .".to_string());
                }
                tokens.push(Token::Number(num_str));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    while let Some(&(_, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

/// `[A-Za-z]+[0-9]+`; range is checked at evaluation time.
fn is_cell_ref_text(s: &str) -> bool {
    let letters = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let digits = &s[letters..];
    letters > 0 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

// `expression: add_expr | concat_expr`. A concatenation chain only joins bare
// operands, so `A1+B1&C1` needs parentheses.
fn parse_expression(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (expr, next) = parse_add_sub(tokens, pos)?;
    if tokens.get(next) != Some(&Token::Ampersand) {
        return Ok((expr, next));
    }

    let (first, after_first) = parse_base(tokens, pos)?;
    if after_first != next {
        return Err("Operator & cannot be mixed with arithmetic without parentheses".to_string());
    }
    parse_concat(tokens, first, next)
}

fn parse_concat(tokens: &[Token], first: Expr, pos: usize) -> Result<(Expr, usize), String> {
    let mut left = first;
    let mut pos = pos;

    while let Some(Token::Ampersand) = tokens.get(pos) {
        let (right, new_pos) = parse_base(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op: Op::Concat,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// At most one sign: `=-5` is fine, `=--5` is not
fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let op = match tokens.get(pos) {
        Some(Token::Plus) => UnaryOp::Plus,
        Some(Token::Minus) => UnaryOp::Minus,
        _ => return parse_base(tokens, pos),
    };
    let (operand, pos) = parse_base(tokens, pos + 1)?;
    Ok((
        Expr::Unary {
            op,
            operand: Box::new(operand),
        },
        pos,
    ))
}

fn parse_base(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let token = tokens
        .get(pos)
        .ok_or_else(|| "Unexpected end of formula".to_string())?;

    match token {
        Token::Number(text) => {
            let value = number::parse_decimal(text)
                .ok_or_else(|| format!("Number out of range: {}", text))?;
            Ok((
                Expr::Number {
                    text: text.clone(),
                    value,
                },
                pos + 1,
            ))
        }
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::ErrorLit(kind) => Ok((Expr::Error(*kind), pos + 1)),
        Token::CellRef(addr) => Ok((
            Expr::CellRef(CellRef {
                sheet: None,
                addr: addr.clone(),
            }),
            pos + 1,
        )),
        Token::SheetPrefix(sheet) => match tokens.get(pos + 1) {
            Some(Token::CellRef(addr)) => Ok((
                Expr::CellRef(CellRef {
                    sheet: Some(sheet.clone()),
                    addr: addr.clone(),
                }),
                pos + 2,
            )),
            _ => Err(format!("Expected cell reference after {}!", sheet.name)),
        },
        Token::LParen => {
            let (inner, pos) = parse_expression(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((Expr::Paren(Box::new(inner)), pos + 1)),
                _ => Err("Expected )".to_string()),
            }
        }
        other => Err(format!("Unexpected token: {}", other.describe())),
    }
}

/// Collect the reference list in source order, uppercased, quotes stripped.
pub fn extract_references(expr: &Expr) -> Vec<Reference> {
    let mut refs = Vec::new();
    collect_references(expr, &mut refs);
    refs
}

fn collect_references(expr: &Expr, refs: &mut Vec<Reference>) {
    match expr {
        Expr::Number { .. } | Expr::Text(_) | Expr::Error(_) => {}
        Expr::CellRef(cell_ref) => {
            let addr = cell_ref.addr.to_uppercase();
            refs.push(match &cell_ref.sheet {
                Some(sheet) => Reference::Sheet(sheet.name.to_uppercase(), addr),
                None => Reference::Local(addr),
            });
        }
        Expr::Unary { operand, .. } => collect_references(operand, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_references(left, refs);
            collect_references(right, refs);
        }
        Expr::Paren(inner) => collect_references(inner, refs),
    }
}

/// Print an expression back to formula text, including the leading `=`.
///
/// Output is compact: no whitespace between tokens.
pub fn format_formula(expr: &Expr) -> String {
    let mut out = String::from("=");
    format_expr(expr, &mut out);
    out
}

fn format_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Number { text, .. } => out.push_str(text),
        Expr::Text(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Expr::Error(kind) => out.push_str(kind.as_str()),
        Expr::CellRef(cell_ref) => {
            if let Some(sheet) = &cell_ref.sheet {
                out.push_str(&format_sheet_name(sheet));
                out.push('!');
            }
            out.push_str(&cell_ref.addr);
        }
        Expr::Unary { op, operand } => {
            out.push(match op {
                UnaryOp::Plus => '+',
                UnaryOp::Minus => '-',
            });
            format_expr(operand, out);
        }
        Expr::BinaryOp { op, left, right } => {
            format_expr(left, out);
            out.push(match op {
                Op::Add => '+',
                Op::Sub => '-',
                Op::Mul => '*',
                Op::Div => '/',
                Op::Concat => '&',
            });
            format_expr(right, out);
        }
        Expr::Paren(inner) => {
            out.push('(');
            format_expr(inner, out);
            out.push(')');
        }
    }
}

fn format_sheet_name(sheet: &SheetName) -> String {
    if sheet.quoted {
        format!("'{}'", sheet.name)
    } else {
        sheet.name.clone()
    }
}
