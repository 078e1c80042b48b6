use clap::{Parser as ClapParser, Subcommand};
use dynq::cli::{self, CheckOptions, CheckResult, CliError, QueryOptions};
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "dynq")]
#[command(about = "dynq - compile and run dynamic query expressions over JSON")]
#[command(version)]
struct Cli {
    /// Log compiler activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and print its value for each JSON input object
    Check {
        /// The expression, with the input object as `it`
        expression: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Field types of the input, e.g. "Name:String,Age:Int32?" or {"Name":"String"}
        #[arg(short, long)]
        schema: Option<String>,

        /// Type the expression must produce
        #[arg(short, long = "result")]
        result_type: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only compile, print the tree and its type
        #[arg(long)]
        syntax_only: bool,
    },

    /// Filter, sort and project a JSON array
    Query {
        /// JSON array input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Field types of each element
        #[arg(short, long)]
        schema: Option<String>,

        /// Predicate each element must satisfy
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        /// Sort keys, e.g. "City, Age desc"
        #[arg(short, long)]
        order_by: Option<String>,

        #[arg(long)]
        skip: Option<usize>,

        #[arg(short, long)]
        take: Option<usize>,

        /// Projection, e.g. "new(Name, Age * 12 as Months)"
        #[arg(long)]
        select: Option<String>,

        /// Print only the number of matching elements
        #[arg(short, long)]
        count: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Check {
            expression,
            input,
            schema,
            result_type,
            pretty,
            syntax_only,
        } => run_check(expression, input, schema, result_type, pretty, syntax_only),
        Commands::Query {
            input,
            schema,
            filter,
            order_by,
            skip,
            take,
            select,
            count,
            pretty,
        } => read_input(input).and_then(|input| {
            let options = QueryOptions {
                input,
                schema,
                filter,
                order_by,
                skip,
                take,
                select,
                count,
            };
            let output = cli::execute_query(&options)?;
            print_json(&output, pretty)
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_input(input: Option<String>) -> Result<Option<String>, CliError> {
    match input {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}

fn print_json(output: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(output)
    } else {
        serde_json::to_string(output)
    }?;
    println!("{}", json);
    Ok(())
}

fn run_check(
    expression: String,
    input: Option<String>,
    schema: Option<String>,
    result_type: Option<String>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let input = if syntax_only && input.is_none() {
        None
    } else {
        read_input(input)?
    };

    let options = CheckOptions {
        expression,
        input,
        schema,
        result_type,
        syntax_only,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid { tree, ty } => println!("{}: {}", ty, tree),
        CheckResult::Success(output) => print_json(&output, pretty)?,
    }
    Ok(())
}
