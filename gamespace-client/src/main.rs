//! GameSpace command-line entry point.

use clap::Parser;
use gamespace_client::cli::{Cli, Command};
use gamespace_client::config::ClientConfig;
use gamespace_client::error::{ClientError, ClientResult};
use gamespace_client::session::GuardDecision;
use gamespace_client::{logging, views, GameSpaceClient};
use gamespace_core::{RegisterRequest, UserSummary};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ClientResult<()> {
    let Cli { config, command } = Cli::parse();

    let config = ClientConfig::load(config.as_deref())?;
    logging::init(&config.logging)?;
    let client = GameSpaceClient::from_config(&config)?;
    client.resolve().await;

    if command.is_protected() {
        require_user(&client).await?;
    }

    match command {
        Command::WhoAmI => match client.session().state().user() {
            Some(user) => println!("Logged in as {}", views::user(user)),
            None => println!("Not logged in."),
        },
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            println!("Welcome back, {}!", user.username);
        }
        Command::Logout => {
            client.logout();
            println!("Logged out.");
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            client
                .register(&RegisterRequest::new(username.as_str(), email, password))
                .await?;
            println!("Account created. Log in with: gamespace login {} <password>", username);
        }
        Command::Trending => {
            let games = client.trending().await?;
            println!("{}", views::catalog(&games));
        }
        Command::Browse(args) => {
            let games = client.catalog(&args.query()).await?;
            println!("{}", views::catalog(&games));
        }
        Command::Game { id } => {
            let game = client.game(id).await?;
            println!("{}", views::game_detail(&game));
        }
        Command::Library => {
            let entries = client.library().await?;
            println!("{}", views::library(&entries));
        }
        Command::Track { game, status } => {
            // The detail gives the title and whether this adds or updates.
            let before = client.game(game).await?;
            let entry = client.upsert_library_entry(game, status).await?;
            let verb = if before.library_entry.is_some() {
                "Updated"
            } else {
                "Added"
            };
            println!("{} {}: {}", verb, before.title, entry.status);
        }
        Command::Review {
            game,
            rating,
            comment,
        } => {
            let review = client
                .create_review(game, rating, &comment.join(" "))
                .await?;
            let refreshed = client.game(game).await?;
            println!(
                "Review submitted ({}). {} is now rated {:.1}/10.",
                review.rating, refreshed.title, refreshed.average_rating
            );
        }
    }

    Ok(())
}

async fn require_user(client: &GameSpaceClient) -> ClientResult<UserSummary> {
    loop {
        match client.guard() {
            GuardDecision::Render(user) => return Ok(user),
            GuardDecision::RedirectToLogin => {
                return Err(ClientError::Usage(
                    "You need to log in first: gamespace login <username> <password>".to_string(),
                ))
            }
            GuardDecision::Wait => {
                client.session().wait_resolved().await;
            }
        }
    }
}
