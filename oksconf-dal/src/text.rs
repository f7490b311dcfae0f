use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit0, digit1, one_of, space0, space1},
    combinator::{all_consuming, cut, map, map_res, opt, recognize, rest, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::{ClassDecl, DalObject, Field, Identity, OksFile, Value};

mod error;
mod write;
pub use error::ParseError;


type Res<T, U> = IResult<T, U, VerboseError<T>>;

const INDENT: usize = 4;

/// One line of the text form
#[derive(Debug, PartialEq)]
enum Line<'t> {
    Blank,
    Include(String),
    Class(&'t str, Vec<&'t str>),
    Object(&'t str, &'t str),
    Field(&'t str, Field),
}

/// Parses the text form of a configuration file
pub fn parse_file(text: &str) -> std::result::Result<OksFile, ParseError> {
    let mut builder = FileBuilder::default();
    for line_text in text.lines() {
        let (_, parsed) = line(line_text).map_err(|e| convert_error(text, e))?;
        builder.add(text, parsed)?;
    }
    Ok(builder.build())
}

fn convert_error<'a>(text: &'a str, e: nom::Err<VerboseError<&'a str>>) -> ParseError<'a> {
    let e = match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => unreachable!("Only complete parsers are used"),
    };
    let mut error = None;
    for (span, kind) in e.errors.iter().rev() {
        error = Some(ParseError::new(
            match kind {
                VerboseErrorKind::Context(expected) => format!("Expected {expected}"),
                VerboseErrorKind::Char(c) => format!("Expected '{c}'"),
                VerboseErrorKind::Nom(p) => format!("Invalid token while looking for: {p:?}"),
            },
            text,
            span,
            error.map(Box::new),
        ));
    }
    error.unwrap_or_else(|| ParseError::new("Unable to parse".into(), text, text, None))
}

fn failure<'t>(input: &'t str, expected: &'static str) -> nom::Err<VerboseError<&'t str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(expected))],
    })
}

fn line(input: &str) -> Res<&str, Line> {
    all_consuming(terminated(line_body, end_of_line))(input)
}

fn line_body(input: &str) -> Res<&str, Line> {
    let (rest, indent) = space0(input)?;
    if rest.is_empty() || rest.starts_with('#') {
        return Ok((rest, Line::Blank));
    }
    if indent.contains('\t') {
        return Err(failure(input, "spaces for indentation, found a tab"));
    }
    match indent.len() {
        0 => top_level(rest),
        INDENT => field(rest),
        _ => Err(failure(input, "no indentation or an indentation of four spaces")),
    }
}

fn end_of_line(input: &str) -> Res<&str, ()> {
    value((), pair(space0, opt(preceded(char('#'), rest))))(input)
}

fn top_level(input: &str) -> Res<&str, Line> {
    alt((
        preceded(
            pair(tag(":include"), space1),
            cut(map(context("an include path", include_path), Line::Include)),
        ),
        preceded(
            pair(tag(":class"), space1),
            cut(map(
                pair(
                    class_name,
                    opt(preceded(
                        tuple((space0, char(':'), space0)),
                        separated_list1(tuple((space0, char(','), space0)), class_name),
                    )),
                ),
                |(name, superclasses)| Line::Class(name, superclasses.unwrap_or_default()),
            )),
        ),
        map(
            separated_pair(class_name, space1, object_id),
            |(class, id)| Line::Object(class, id),
        ),
    ))(input)
}

fn field(input: &str) -> Res<&str, Line> {
    let (input, name) = context("a field name", field_name)(input)?;
    let (input, _) = space0(input)?;
    let (input, field) = alt((
        preceded(
            pair(char('='), space0),
            cut(context(
                "a value",
                alt((map(scalar, Field::Scalar), map(scalar_list, Field::Scalars))),
            )),
        ),
        preceded(
            pair(tag("->"), space0),
            cut(context(
                "a reference",
                alt((
                    map(identity, Field::Reference),
                    map(identity_list, Field::References),
                )),
            )),
        ),
    ))(input)?;
    Ok((input, Line::Field(name, field)))
}

/// Characters of class and field names
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Characters of object ids
fn is_id_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '@' | ',' | '[' | ']' | '#' | '"' | '=')
}

fn class_name(input: &str) -> Res<&str, &str> {
    context("a class name", take_while1(is_name_char))(input)
}

fn field_name(input: &str) -> Res<&str, &str> {
    take_while1(is_name_char)(input)
}

fn object_id(input: &str) -> Res<&str, &str> {
    context("an object id", take_while1(is_id_char))(input)
}

/// A quoted include path, or a bare one running up to whitespace or a comment
fn include_path(input: &str) -> Res<&str, String> {
    alt((string_literal, map(is_not(" \t#\""), str::to_owned)))(input)
}

fn identity(input: &str) -> Res<&str, Identity> {
    map(separated_pair(class_name, char('@'), object_id), |(class, id)| {
        Identity::new(class, id)
    })(input)
}

fn identity_list(input: &str) -> Res<&str, Vec<Identity>> {
    delimited(
        pair(char('['), space0),
        separated_list0(tuple((space0, char(','), space0)), identity),
        pair(space0, char(']')),
    )(input)
}

fn scalar(input: &str) -> Res<&str, Value> {
    alt((
        map(string_literal, Value::String),
        value(Value::Bool(true), tag("true")),
        value(Value::Bool(false), tag("false")),
        number,
    ))(input)
}

fn scalar_list(input: &str) -> Res<&str, Vec<Value>> {
    delimited(
        pair(char('['), space0),
        separated_list0(tuple((space0, char(','), space0)), scalar),
        pair(space0, char(']')),
    )(input)
}

fn number(input: &str) -> Res<&str, Value> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| -> Result<Value, String> {
            if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
                let float: f64 = text.parse().map_err(|e| format!("{e}"))?;
                if !float.is_finite() {
                    return Err(format!("Float out of range: {text}"));
                }
                Ok(Value::Float(float))
            } else {
                text.parse().map(Value::Integer).map_err(|e| format!("{e}"))
            }
        },
    )(input)
}

fn string_literal(input: &str) -> Res<&str, String> {
    let (mut remaining, _) = char('"')(input)?;
    let mut string = String::new();
    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            None => return Err(failure(remaining, "a closing quote")),
            Some('"') => return Ok((&remaining[1..], string)),
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    _ => return Err(failure(remaining, "a valid escape sequence")),
                };
                string.push(escaped);
                remaining = &remaining[2..];
            }
            Some(c) => {
                string.push(c);
                remaining = &remaining[c.len_utf8()..];
            }
        }
    }
}

#[derive(Default)]
struct FileBuilder {
    file: OksFile,
    current: Option<DalObject>,
}

impl FileBuilder {
    fn add<'t>(&mut self, text: &'t str, line: Line<'t>) -> Result<(), ParseError<'t>> {
        match line {
            Line::Blank => {}
            Line::Include(path) => {
                self.finish_object();
                self.file.includes.push(path.into());
            }
            Line::Class(name, superclasses) => {
                self.finish_object();
                if self.file.classes.iter().any(|class| class.name == name) {
                    return Err(ParseError::new(
                        format!("Class {name} is declared twice"),
                        text,
                        name,
                        None,
                    ));
                }
                self.file.classes.push(ClassDecl {
                    name: name.to_owned(),
                    superclasses: superclasses.into_iter().map(str::to_owned).collect(),
                });
            }
            Line::Object(class, id) => {
                self.finish_object();
                let object = DalObject::new(class, id);
                if self.file.objects.contains_key(object.identity()) {
                    return Err(ParseError::new(
                        format!("Object {} is defined twice", object.identity()),
                        text,
                        class,
                        None,
                    ));
                }
                self.current = Some(object);
            }
            Line::Field(name, field) => {
                let Some(object) = self.current.as_mut() else {
                    return Err(ParseError::new(
                        format!("Field {name} does not belong to an object"),
                        text,
                        name,
                        None,
                    ));
                };
                if object.set(name, field).is_some() {
                    return Err(ParseError::new(
                        format!("Field {name} is set twice on {}", object.identity()),
                        text,
                        name,
                        None,
                    ));
                }
            }
        }
        Ok(())
    }

    fn finish_object(&mut self) {
        if let Some(object) = self.current.take() {
            self.file.objects.insert(object.identity().clone(), object);
        }
    }

    fn build(mut self) -> OksFile {
        self.finish_object();
        self.file
    }
}
