//! Plain-text renderings for the `gamespace` binary.

use gamespace_core::{Game, LibraryEntry, Review, UserSummary};
use std::fmt::Write;

pub fn user(user: &UserSummary) -> String {
    match &user.role {
        Some(role) => format!("{} (#{}, {})", user.username, user.id, role),
        None => format!("{} (#{})", user.username, user.id),
    }
}

pub fn catalog(games: &[Game]) -> String {
    if games.is_empty() {
        return "No games found.".to_string();
    }
    games.iter().map(game_row).collect::<Vec<_>>().join("\n")
}

pub fn game_row(game: &Game) -> String {
    let mut row = format!("#{:<5} {}", game.id.get(), game.title);
    if let Some(genre) = &game.genre {
        let _ = write!(row, " [{}]", genre);
    }
    let _ = write!(row, "  {:.1}/10", game.average_rating);
    row
}

pub fn game_detail(game: &Game) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", game.title);
    let _ = writeln!(out, "  Developer: {}", game.developer);
    let _ = writeln!(out, "  Publisher: {}", game.publisher);
    if let Some(genre) = &game.genre {
        let _ = writeln!(out, "  Genre:     {}", genre);
    }
    if let Some(released) = game.release_date {
        let _ = writeln!(out, "  Released:  {}", released);
    }
    let _ = writeln!(out, "  Rating:    {:.1}/10", game.average_rating);
    if let Some(entry) = &game.library_entry {
        let _ = writeln!(out, "  In your library: {}", entry.status);
    }
    if let Some(description) = game.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(out, "\n{}", description.trim());
    }
    match game.reviews.as_deref() {
        Some([]) => {
            let _ = writeln!(out, "\nNo reviews yet.");
        }
        Some(reviews) => {
            let _ = writeln!(out, "\nReviews:");
            for review in reviews {
                let _ = writeln!(out, "  {}", review_line(review));
            }
        }
        None => {}
    }
    out.trim_end().to_string()
}

pub fn review_line(review: &Review) -> String {
    format!(
        "{} by user #{} on {}: {}",
        review.rating,
        review.user_id,
        review.created_at.format("%Y-%m-%d"),
        review.comment
    )
}

pub fn library(entries: &[LibraryEntry]) -> String {
    if entries.is_empty() {
        return "Your library is empty.".to_string();
    }
    entries
        .iter()
        .map(|entry| format!("game #{:<5} {}", entry.game_id.get(), entry.status))
        .collect::<Vec<_>>()
        .join("\n")
}
