mod args;
mod matrix;
mod report;
mod utils;
mod vector;

use clap::{
    Parser,
    Subcommand,
};
use matrix::MatrixArgs;
use utils::UtilsArgs;
use vector::VectorArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Find regions in labelled vectors.
    Vector {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  VectorArgs,
    },

    /// Find regions in symmetric matrices.
    Matrix {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  MatrixArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::Vector { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Matrix { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
    }
    Ok(())
}
