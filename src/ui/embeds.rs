use chrono::{DateTime, TimeZone};
use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::fmt::Display;

use crate::audio::queue::TrackRequest;

/// Colour palette shared by every embed the bot sends.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const GOLD: Colour = Colour::from_rgb(241, 196, 15);
}

/// How many entries `/top` shows.
pub const TOP_LIMIT: usize = 5;

fn with_thumbnail(embed: CreateEmbed, track: &TrackRequest) -> CreateEmbed {
    if track.thumbnail().is_empty() {
        embed
    } else {
        embed.thumbnail(track.thumbnail())
    }
}

/// Embed for the track that just started.
pub fn create_now_playing_embed(track: &TrackRequest) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title()))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(track.requested_by()))
        .timestamp(Timestamp::now());

    with_thumbnail(embed, track)
}

/// Embed confirming a track was queued.
pub fn create_track_added_embed(track: &TrackRequest) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Added to Queue")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(track.requested_by()));

    with_thumbnail(embed, track)
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
}

/// Embed listing the most played titles with the time the list was taken.
pub fn create_top_embed<Tz>(entries: &[(String, u64)], taken_at: DateTime<Tz>) -> CreateEmbed
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let embed = CreateEmbed::default()
        .title(format!("🎶 Top {} Most Played Songs", TOP_LIMIT))
        .color(colors::GOLD)
        .footer(CreateEmbedFooter::new(format!(
            "Statistics Time: {}",
            taken_at.format("%Y-%m-%d %H:%M:%S")
        )));

    entries
        .iter()
        .enumerate()
        .fold(embed, |embed, (index, (title, count))| {
            embed.field(
                format!("#{} - {}", index + 1, title),
                format!("Play Count: {} times", count),
                false,
            )
        })
}

/// Numbered list of queued titles, one per line.
pub fn format_queue_listing<'a>(tracks: impl IntoIterator<Item = &'a TrackRequest>) -> String {
    tracks
        .into_iter()
        .enumerate()
        .map(|(index, track)| format!("{}. {}", index + 1, track.title()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn track(title: &str, thumbnail: &str) -> TrackRequest {
        TrackRequest::new("https://cdn.example/a", title, thumbnail, "someone")
    }

    fn to_json(embed: CreateEmbed) -> Value {
        serde_json::to_value(embed).expect("embeds serialize")
    }

    #[test]
    fn queue_listing_is_numbered() {
        let tracks = [track("first", ""), track("second", "")];
        assert_eq!(format_queue_listing(&tracks), "1. first\n2. second");
        assert_eq!(format_queue_listing(&Vec::<TrackRequest>::new()), "");
    }

    #[test]
    fn added_embed_carries_title_and_requester() {
        let json = to_json(create_track_added_embed(&track("Song", "https://img.example/t.jpg")));

        assert_eq!(json["title"], "✅ Added to Queue");
        assert_eq!(json["description"], "**Song**");
        assert_eq!(json["footer"]["text"], "someone");
        assert_eq!(json["thumbnail"]["url"], "https://img.example/t.jpg");
    }

    #[test]
    fn empty_thumbnail_is_left_out() {
        let json = to_json(create_now_playing_embed(&track("Song", "")));
        assert!(json.get("thumbnail").map_or(true, Value::is_null));
    }

    #[test]
    fn top_embed_ranks_entries() {
        let taken_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let entries = vec![("a".to_string(), 3), ("b".to_string(), 1)];
        let json = to_json(create_top_embed(&entries, taken_at));

        assert_eq!(json["fields"][0]["name"], "#1 - a");
        assert_eq!(json["fields"][0]["value"], "Play Count: 3 times");
        assert_eq!(json["fields"][1]["name"], "#2 - b");
        assert_eq!(json["footer"]["text"], "Statistics Time: 2024-05-01 12:30:00");
    }
}
