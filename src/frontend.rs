//! Frontend: convert textual IR to a `Module`.

use crate::entity::EntityRef;
use crate::errors::ParseError;
use crate::ir::*;
use anyhow::Result;
use log::trace;
use smallvec::SmallVec;
use std::iter::Peekable;
use std::str::CharIndices;

/// Symbol given to string literals written inline in call arguments.
const INLINE_STR_SYMBOL: &str = "str";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    /// `@name`
    Global(String),
    /// `$name`
    Const(String),
    Str(String),
    Int(i64),
    Punct(char),
}

struct Line<'a> {
    number: usize,
    tokens: Vec<Token>,
    /// The line with any comment removed.
    code: &'a str,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

type Chars<'a> = Peekable<CharIndices<'a>>;

fn take_while(chars: &mut Chars<'_>, pred: fn(char) -> bool) -> String {
    let mut s = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !pred(c) {
            break;
        }
        s.push(c);
        chars.next();
    }
    s
}

fn lex(line: &str, number: usize) -> Result<Line<'_>, ParseError> {
    let mut tokens = vec![];
    let mut code_end = line.len();
    let mut chars = line.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                code_end = pos;
                break;
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars, number)?));
            }
            '@' | '$' => {
                chars.next();
                let name = take_while(&mut chars, is_ident_char);
                if name.is_empty() {
                    return Err(ParseError::new(number, format!("expected a name after `{}`", c)));
                }
                tokens.push(if c == '@' {
                    Token::Global(name)
                } else {
                    Token::Const(name)
                });
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, d)) if d.is_ascii_digit() => {
                        let digits = take_while(&mut chars, is_ident_char);
                        match format!("-{}", digits).parse::<i64>() {
                            Ok(value) => tokens.push(Token::Int(value)),
                            Err(_) => {
                                tokens.push(Token::Punct('-'));
                                tokens.push(Token::Ident(digits));
                            }
                        }
                    }
                    _ => tokens.push(Token::Punct('-')),
                }
            }
            c if is_ident_char(c) => {
                let word = take_while(&mut chars, is_ident_char);
                match word.parse::<i64>() {
                    Ok(value) => tokens.push(Token::Int(value)),
                    Err(_) => tokens.push(Token::Ident(word)),
                }
            }
            c => {
                chars.next();
                tokens.push(Token::Punct(c));
            }
        }
    }

    Ok(Line {
        number,
        tokens,
        code: &line[..code_end],
    })
}

fn lex_string(chars: &mut Chars<'_>, number: usize) -> Result<String, ParseError> {
    let mut value = String::new();
    loop {
        let c = match chars.next() {
            Some((_, c)) => c,
            None => return Err(ParseError::new(number, "unterminated string literal")),
        };
        match c {
            '"' => return Ok(value),
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, '"')) => '"',
                    Some((_, '\\')) => '\\',
                    Some((_, 'x')) => {
                        let hex = chars.by_ref().take(2).map(|(_, c)| c).collect::<String>();
                        let digits_ok = hex.len() == 2 && hex.chars().all(|c| c.is_ascii_hexdigit());
                        match u8::from_str_radix(&hex, 16) {
                            Ok(byte) if digits_ok && byte < 0x80 => byte as char,
                            _ => {
                                return Err(ParseError::new(
                                    number,
                                    format!("bad escape `\\x{}`", hex),
                                ))
                            }
                        }
                    }
                    Some((_, other)) => {
                        return Err(ParseError::new(number, format!("bad escape `\\{}`", other)))
                    }
                    None => return Err(ParseError::new(number, "unterminated string literal")),
                };
                value.push(escaped);
            }
            c => value.push(c),
        }
    }
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Ident(word) if word == keyword)
}

/// Parse a `blockN` reference.
fn block_ref(token: &Token) -> Option<Block> {
    match token {
        Token::Ident(word) => word
            .strip_prefix("block")
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .filter(|&n| n != u32::MAX)
            .map(Block::from),
        _ => None,
    }
}

/// A function body under construction.
struct BodyBuilder {
    func: Func,
    name: String,
    start_line: usize,
    body: FunctionBody,
    cur_block: Option<Block>,
    /// Block references to check once all blocks are known.
    block_refs: Vec<(Block, usize)>,
}

impl BodyBuilder {
    fn block(&mut self) -> Block {
        match self.cur_block {
            Some(block) => block,
            None => {
                let block = self.body.add_block("entry");
                self.cur_block = Some(block);
                block
            }
        }
    }

    fn finish(self, module: &mut Module) -> Result<(), ParseError> {
        for &(block, line) in &self.block_refs {
            if !self.body.blocks.contains(block) {
                return Err(ParseError::new(
                    line,
                    format!("reference to missing block {} in @{}", block, self.name),
                ));
            }
        }
        trace!(
            "parsed {} (@{}): {} blocks",
            self.func,
            self.name,
            self.body.blocks.len()
        );
        module.funcs[self.func] = FuncDecl::Body(self.name, self.body);
        Ok(())
    }
}

/// Parse a parenthesized, comma-separated operand list that ends the
/// line.
fn parse_args(module: &mut Module, tokens: &[Token], line: usize) -> Result<Vec<Operand>, ParseError> {
    let inner = match tokens {
        [Token::Punct('('), inner @ .., Token::Punct(')')] => inner,
        _ => return Err(ParseError::new(line, "expected a parenthesized argument list")),
    };
    let mut args = vec![];
    for (i, chunk) in inner.split(|t| *t == Token::Punct(',')).enumerate() {
        if inner.is_empty() && i == 0 {
            break;
        }
        let arg = match chunk {
            [Token::Int(value)] => Operand::Int(*value),
            [Token::Str(value)] => module
                .materialize(value, INLINE_STR_SYMBOL)
                .map_err(|e| ParseError::new(line, e.to_string()))?,
            [Token::Const(symbol)] => match module.string_by_symbol(symbol) {
                Some(s) => Operand::Str(s),
                None => return Err(ParseError::new(line, format!("unknown constant `${}`", symbol))),
            },
            _ => return Err(ParseError::new(line, format!("bad argument {}", i + 1))),
        };
        args.push(arg);
    }
    Ok(args)
}

fn parse_inst(
    module: &mut Module,
    builder: &mut BodyBuilder,
    line: &Line,
) -> Result<(), ParseError> {
    let number = line.number;
    let tokens = &line.tokens[..];

    // Block label.
    if let [Token::Ident(label), Token::Punct(':')] = tokens {
        let block = builder.body.add_block(label.clone());
        builder.cur_block = Some(block);
        return Ok(());
    }

    let data = match tokens {
        [first, ..] if ["define", "declare", "const"].iter().any(|kw| is_keyword(first, kw)) => {
            return Err(ParseError::new(
                number,
                format!("missing `}}` to close @{}", builder.name),
            ));
        }
        [first, rest @ ..] if is_keyword(first, "phi") => {
            let mut preds = SmallVec::new();
            for (i, token) in rest.iter().enumerate() {
                let expect_block = i % 2 == 0;
                match (expect_block, block_ref(token)) {
                    (true, Some(pred)) => {
                        builder.block_refs.push((pred, number));
                        preds.push(pred);
                    }
                    (false, None) if *token == Token::Punct(',') && i + 1 < rest.len() => {}
                    _ => return Err(ParseError::new(number, "expected `phi blockN, blockM, ...`")),
                }
            }
            InstData::Phi(preds)
        }
        [first, Token::Global(name), rest @ ..] if is_keyword(first, "call") => {
            let func = match module.func_by_name(name) {
                Some(func) => func,
                None => return Err(ParseError::new(number, format!("unknown function @{}", name))),
            };
            let args = parse_args(module, rest, number)?;
            InstData::call(func, args)
        }
        [first, rest @ ..] if is_keyword(first, "call_indirect") => InstData::Call {
            callee: Callee::Indirect,
            args: parse_args(module, rest, number)?,
        },
        [first, ..] if is_keyword(first, "call") => {
            return Err(ParseError::new(number, "expected `call @name(args)`"));
        }
        [first] if is_keyword(first, "ret") => InstData::Return,
        [first, ..] if is_keyword(first, "ret") => {
            return Err(ParseError::new(number, "`ret` takes no operands"));
        }
        [first] if is_keyword(first, "unreachable") => InstData::Other(Op::Unreachable),
        [first, ..] if is_keyword(first, "unreachable") => {
            return Err(ParseError::new(number, "`unreachable` takes no operands"));
        }
        [first, rest @ ..] if is_keyword(first, "br") => match rest.first().and_then(block_ref) {
            Some(target) if rest.len() == 1 => {
                builder.block_refs.push((target, number));
                InstData::Other(Op::Br(target))
            }
            _ => return Err(ParseError::new(number, "expected `br blockN`")),
        },
        [Token::Ident(_), ..] => InstData::Other(Op::Opaque(line.code.trim().to_owned())),
        _ => return Err(ParseError::new(number, "expected an instruction")),
    };

    let block = builder.block();
    let has_non_phi = builder.body.blocks[block]
        .insts
        .iter()
        .any(|&inst| !builder.body.insts[inst].is_phi());
    if data.is_phi() && has_non_phi {
        return Err(ParseError::new(
            number,
            "phi must come before every other instruction in its block",
        ));
    }
    builder.body.append_inst(block, data);
    Ok(())
}

/// Parse a whole module.
pub fn text_to_ir(text: &str) -> Result<Module> {
    let lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| lex(line, i + 1))
        .collect::<Result<Vec<_>, _>>()?;
    let mut module = Module::empty();

    // First, declare every function and constant so that bodies may
    // refer to ones that appear later in the text.
    for line in &lines {
        match &line.tokens[..] {
            [kw, Token::Global(name)] if is_keyword(kw, "declare") => {
                declare(&mut module, FuncDecl::Import(name.clone()), line.number)?;
            }
            [kw, Token::Global(name), Token::Punct('{')] if is_keyword(kw, "define") => {
                let decl = FuncDecl::Body(name.clone(), FunctionBody::default());
                declare(&mut module, decl, line.number)?;
            }
            [kw, Token::Const(symbol), Token::Punct('='), Token::Str(value)]
                if is_keyword(kw, "const") =>
            {
                if module.string_by_symbol(symbol).is_some() {
                    return Err(
                        ParseError::new(line.number, format!("duplicate constant `${}`", symbol))
                            .into(),
                    );
                }
                module
                    .materialize(value, symbol)
                    .map_err(|e| ParseError::new(line.number, e.to_string()))?;
            }
            _ => {}
        }
    }

    let mut current: Option<BodyBuilder> = None;
    for line in &lines {
        if line.tokens.is_empty() {
            continue;
        }
        match current.take() {
            None => match &line.tokens[..] {
                [kw, Token::Global(_)] if is_keyword(kw, "declare") => {}
                [kw, Token::Const(_), Token::Punct('='), Token::Str(_)]
                    if is_keyword(kw, "const") => {}
                [kw, Token::Global(name), Token::Punct('{')] if is_keyword(kw, "define") => {
                    let func = module.func_by_name(name).ok_or_else(|| {
                        ParseError::new(line.number, format!("@{} was not declared", name))
                    })?;
                    current = Some(BodyBuilder {
                        func,
                        name: name.clone(),
                        start_line: line.number,
                        body: FunctionBody::default(),
                        cur_block: None,
                        block_refs: vec![],
                    });
                }
                _ => {
                    return Err(ParseError::new(
                        line.number,
                        "expected `declare`, `define` or `const`",
                    )
                    .into())
                }
            },
            Some(builder) if line.tokens == [Token::Punct('}')] => {
                builder.finish(&mut module)?;
            }
            Some(mut builder) => {
                parse_inst(&mut module, &mut builder, line)?;
                current = Some(builder);
            }
        }
    }
    if let Some(builder) = current {
        return Err(ParseError::new(
            builder.start_line,
            format!("@{} is missing its closing `}}`", builder.name),
        )
        .into());
    }

    module.validate()?;
    Ok(module)
}

fn declare(module: &mut Module, decl: FuncDecl, line: usize) -> Result<Func, ParseError> {
    if module.func_by_name(decl.name()).is_some() {
        return Err(ParseError::new(
            line,
            format!("duplicate function @{}", decl.name()),
        ));
    }
    Ok(module.add_func(decl))
}
