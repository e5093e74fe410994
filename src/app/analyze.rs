//! This module contains the logic for the `lslcc-analyze` binary.

use std::error::Error;
use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;

use clap::{App, Arg, SubCommand};
use pest::Parser;
use simplelog::*;

use crate::parse::{LslParser, Rule, SourceMapper};
use crate::reporting::Handler;
use crate::stdlib::LibraryProvider;
use crate::strings::DefaultStringPreprocessor;
use crate::ValidatorConfig;

enum Analysis {
    Parse,
    AST,
    Prettyprint,
    Comments,
    Validate,
}

pub struct Config {
    which: Analysis,
    filename: String,
    subsets: Vec<String>,
    tab_size: usize,
}

impl Config {
    pub fn new(args: &[String]) -> Self {
        let matches = App::new("lslcc-analyze")
            .version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .about("lslcc-analyze validates LSL scripts against a standard-library definition")
            .arg(Arg::with_name("v").short("v").multiple(true).required(false).help("Sets the level of verbosity"))
            .arg(
                Arg::with_name("subsets")
                    .long("subsets")
                    .takes_value(true)
                    .use_delimiter(true)
                    .help("Active library subsets, e.g. lsl,ossl"),
            )
            .arg(
                Arg::with_name("tab-size")
                    .long("tab-size")
                    .takes_value(true)
                    .help("Tab width used for error column numbers"),
            )
            .arg(Arg::with_name("INPUT").help("Sets the input file to use").required(true).index(1))
            .subcommand(SubCommand::with_name("parse").about("Parses the input file and outputs the parse tree"))
            .subcommand(
                SubCommand::with_name("ast")
                    .about("Parses the input file and outputs the internal representation of the syntax tree"),
            )
            .subcommand(
                SubCommand::with_name("pretty-print")
                    .about("Parses the input file and outputs a pretty printed representation"),
            )
            .subcommand(SubCommand::with_name("comments").about("Lists the comments of the input file with ranges"))
            .subcommand(SubCommand::with_name("validate").about("Runs the full validation pipeline"))
            .get_matches_from(args);

        let verbosity = match matches.occurrences_of("v") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let filename = matches.value_of("INPUT").map(std::string::ToString::to_string).unwrap();

        let subsets = matches
            .values_of("subsets")
            .map(|vals| vals.map(std::string::ToString::to_string).collect())
            .unwrap_or_else(|| vec!["lsl".to_string()]);
        let tab_size = matches.value_of("tab-size").and_then(|v| v.parse().ok()).unwrap_or(4);

        let mut logger: Vec<Box<dyn SharedLogger>> = Vec::new();
        if let Some(term_logger) = TermLogger::new(verbosity, simplelog::Config::default(), TerminalMode::Mixed) {
            logger.push(term_logger);
        } else {
            logger.push(SimpleLogger::new(verbosity, simplelog::Config::default()))
        }

        CombinedLogger::init(logger).expect("failed to initialize logging framework");

        let which = match matches.subcommand() {
            ("parse", Some(_)) => Analysis::Parse,
            ("ast", Some(_)) => Analysis::AST,
            ("pretty-print", Some(_)) => Analysis::Prettyprint,
            ("comments", Some(_)) => Analysis::Comments,
            // default to `validate`
            ("validate", Some(_)) | ("", None) => Analysis::Validate,
            _ => unreachable!(),
        };
        Config { which, filename, subsets, tab_size }
    }

    pub fn run(&self) -> Result<(), Box<dyn Error>> {
        let mut file = File::open(&self.filename)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        match &self.which {
            Analysis::Parse => {
                let result = LslParser::parse(Rule::Script, &contents).unwrap_or_else(|e| panic!("{}", e));
                println!("{:#?}", result);
                Ok(())
            }
            Analysis::AST => {
                let output = crate::parse::parse(&contents, &DefaultStringPreprocessor::new())
                    .unwrap_or_else(|e| panic!("{}", e));
                println!("{:#?}", output.script);
                Ok(())
            }
            Analysis::Prettyprint => {
                let output = crate::parse::parse(&contents, &DefaultStringPreprocessor::new())
                    .unwrap_or_else(|e| panic!("{}", e));
                println!("{}", output.script);
                Ok(())
            }
            Analysis::Comments => {
                for comment in crate::parse::extract_comments(&contents) {
                    println!("{}..{}: {}", comment.span.start, comment.span.end, comment.text);
                }
                Ok(())
            }
            Analysis::Validate => {
                let subsets: Vec<&str> = self.subsets.iter().map(String::as_str).collect();
                let provider = LibraryProvider::embedded(&subsets);
                let mapper = SourceMapper::with_tab_size(PathBuf::from(&self.filename), &contents, self.tab_size);
                let handler = Handler::new(mapper);
                let config = ValidatorConfig::new().tab_size(self.tab_size);
                let unit = crate::validate(&contents, &provider, &handler, &config);
                if unit.has_errors() {
                    eprintln!("{} error(s), {} warning(s)", unit.errors, unit.warnings);
                    std::process::exit(1);
                }
                println!("ok: {} warning(s)", unit.warnings);
                Ok(())
            }
        }
    }
}
