use nom::{
	branch::alt,
	bytes::complete::{
		take_till,
		take_till1
	},
	character::complete::{
		char,
		not_line_ending
	},
	combinator::{
		map,
		value
	},
	error::ParseError,
	IResult,
	sequence::{
		delimited,
		pair,
		separated_pair
	},
};

/// Parses a hash-prefixed ('#') or semicolon-prefixed (';') line comment
pub fn ini_comment<'a, E>(input: &'a str) -> IResult<&'a str, (), E>
where
	E: ParseError<&'a str>
{
	value((), pair(alt((char('#'), char(';'))), not_line_ending))(input)
}

/// Parses an INI section header such as `[Settings]`, returning the trimmed name
pub fn section_header<'a, E>(input: &'a str) -> IResult<&'a str, &'a str, E>
where
	E: ParseError<&'a str>
{
	map(
		delimited(char('['), take_till(|c| c == ']' || c == '\n'), char(']')),
		str::trim
	)(input)
}

/// Parses an INI entry line. Accepts both `key = value` and a bare `key`,
/// which yields an empty value. Keys and values are trimmed.
pub fn ini_entry<'a, E>(input: &'a str) -> IResult<&'a str, (&'a str, &'a str), E>
where
	E: ParseError<&'a str>
{
	alt((
		map(
			separated_pair(take_till1(|c| c == '=' || c == '\n' || c == '\r'), char('='), not_line_ending),
			|(k, v): (&'a str, &'a str)| (k.trim(), v.trim())
		),
		map(not_line_ending, |k: &'a str| (k.trim(), "")),
	))(input)
}
