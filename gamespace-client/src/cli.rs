//! Command-line interface of the `gamespace` binary.

use clap::{Args, Parser, Subcommand};
use gamespace_core::{CatalogOrdering, CatalogQuery, GameId, LibraryStatus};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gamespace")]
#[command(about = "Browse the GameSpace catalog, track games and write reviews", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Config file. Falls back to GAMESPACE_CONFIG.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Show the logged-in user
    #[command(name = "whoami")]
    WhoAmI,
    /// Start a session
    Login { username: String, password: String },
    /// End the session
    Logout,
    /// Create an account
    Register {
        username: String,
        email: String,
        password: String,
    },
    /// Most-tracked games
    Trending,
    /// Search and filter the catalog
    Browse(BrowseArgs),
    /// Game details and reviews
    Game { id: GameId },
    /// Your tracked games
    Library,
    /// Add a game to your library or change its status
    Track {
        game: GameId,
        /// PLAYING, COMPLETED, WISHLIST or DROPPED
        status: LibraryStatus,
    },
    /// Review a game
    Review {
        game: GameId,
        /// Whole number from 1 to 10
        #[arg(allow_negative_numbers = true)]
        rating: i64,
        #[arg(required = true, num_args = 1..)]
        comment: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct BrowseArgs {
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
    /// -release_date, release_date, -average_rating, average_rating or title
    #[arg(long, allow_hyphen_values = true)]
    pub ordering: Option<CatalogOrdering>,
}

impl BrowseArgs {
    pub fn query(&self) -> CatalogQuery {
        let mut query = CatalogQuery::default();
        if let Some(search) = &self.search {
            query = query.with_search(search.as_str());
        }
        if let Some(genre) = &self.genre {
            query = query.with_genre(genre.as_str());
        }
        if let Some(ordering) = self.ordering {
            query = query.with_ordering(ordering);
        }
        query
    }
}

impl Command {
    /// Commands that need a logged-in user.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Command::Library | Command::Track { .. } | Command::Review { .. }
        )
    }
}
