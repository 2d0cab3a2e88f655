//! Telegram bot front end.
//!
//! Every non-command message is structured and stored; `/ask` goes to
//! the retrieval pipeline. Voice and photo messages are downloaded to
//! scoped temp files that are removed on every exit path.

use anyhow::Result;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::knowledge::record::SourceType;
use crate::pipeline::StoredKnowledge;

use super::Services;

/// Run the bot with long polling until interrupted.
pub async fn run(bot_token: &str, services: Services) -> Result<()> {
    let bot = Bot::new(bot_token);

    info!("Second Brain bot started, waiting for messages");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().map(|t| t.trim() == "/start").unwrap_or(false))
                .endpoint(handle_start),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().map(|t| t.starts_with("/ask")).unwrap_or(false))
                .endpoint(handle_ask),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.voice().is_some())
                .endpoint(handle_voice),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.photo().is_some())
                .endpoint(handle_photo),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_text),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![services])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(
        msg.chat.id,
        "Hi! I am your second brain.\n\n\
         Send me any text, voice message or photo and I will structure \
         it and file it in your knowledge base.\n\
         Ask me later with /ask <question>.",
    )
    .await?;
    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, services: Services) -> Result<()> {
    let raw_text = match msg.text() {
        Some(t) if !t.starts_with('/') => t,
        _ => return Ok(()),
    };

    info!("Text message received: '{:.50}'", raw_text);

    ingest_and_reply(&bot, &msg, &services, raw_text, SourceType::TelegramTextMessage).await
}

async fn handle_ask(bot: Bot, msg: Message, services: Services) -> Result<()> {
    let query = msg
        .text()
        .and_then(|t| t.strip_prefix("/ask"))
        .map(str::trim)
        .unwrap_or_default();

    if query.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /ask <your question>")
            .await?;
        return Ok(());
    }

    info!("Question received: '{:.50}'", query);
    bot.send_message(msg.chat.id, "Searching your second brain...")
        .await?;

    let answer = services.retrieval.answer(query).await;
    bot.send_message(msg.chat.id, answer)
        .reply_to_message_id(msg.id)
        .await?;

    Ok(())
}

async fn handle_voice(bot: Bot, msg: Message, services: Services) -> Result<()> {
    let Some(voice) = msg.voice() else {
        return Ok(());
    };

    info!("Voice message received");
    let processing = bot
        .send_message(msg.chat.id, "Transcribing your voice message...")
        .await?;

    // Temp file is removed when the guard drops, error paths included
    let temp = match download_to_temp(&bot, &voice.file.id, ".oga").await {
        Ok(temp) => temp,
        Err(e) => {
            error!("Failed to download voice file: {}", e);
            bot.edit_message_text(
                msg.chat.id,
                processing.id,
                "Error: I could not download your voice message.",
            )
            .await?;
            return Ok(());
        }
    };

    let text = match services.media.transcribe(temp.path()).await {
        Ok(text) => text,
        Err(e) => {
            error!("Transcription failed: {}", e);
            String::new()
        }
    };

    if text.is_empty() {
        bot.edit_message_text(
            msg.chat.id,
            processing.id,
            "Sorry, I could not recognize any speech in that recording.",
        )
        .await?;
        return Ok(());
    }

    bot.edit_message_text(
        msg.chat.id,
        processing.id,
        format!("Recognized: «{}»\n\nStructuring and saving...", text),
    )
    .await?;

    ingest_and_reply(&bot, &msg, &services, &text, SourceType::VoiceNote).await
}

async fn handle_photo(bot: Bot, msg: Message, services: Services) -> Result<()> {
    // Highest resolution size is last
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    info!("Photo message received");
    let processing = bot
        .send_message(msg.chat.id, "Extracting text from the image...")
        .await?;

    let temp = match download_to_temp(&bot, &photo.file.id, ".jpg").await {
        Ok(temp) => temp,
        Err(e) => {
            error!("Failed to download photo: {}", e);
            bot.edit_message_text(
                msg.chat.id,
                processing.id,
                "Error: I could not download your photo.",
            )
            .await?;
            return Ok(());
        }
    };

    let text = match services.media.ocr(temp.path()).await {
        Ok(text) => text,
        Err(e) => {
            error!("Image text extraction failed: {}", e);
            String::new()
        }
    };

    if text.is_empty() {
        bot.edit_message_text(msg.chat.id, processing.id, "No text was found in the image.")
            .await?;
        return Ok(());
    }

    bot.edit_message_text(
        msg.chat.id,
        processing.id,
        format!("Extracted text:\n\n«{}»\n\nStructuring and saving...", text),
    )
    .await?;

    ingest_and_reply(&bot, &msg, &services, &text, SourceType::Screenshot).await
}

/// Shared tail of every ingestion path: run the pipeline and confirm
/// or report the failing stage.
async fn ingest_and_reply(
    bot: &Bot,
    msg: &Message,
    services: &Services,
    raw_text: &str,
    source: SourceType,
) -> Result<()> {
    match services.ingest.ingest(raw_text, source).await {
        Ok(stored) => {
            bot.send_message(msg.chat.id, confirmation(&stored))
                .parse_mode(ParseMode::Markdown)
                .reply_to_message_id(msg.id)
                .await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, e.user_message())
                .reply_to_message_id(msg.id)
                .await?;
        }
    }
    Ok(())
}

fn confirmation(stored: &StoredKnowledge) -> String {
    format!(
        "Saved to your second brain!\n\n\
         *Title:* {}\n\
         *Action:* {}\n\
         *ID:* `{}`",
        stored.record.core_content.title, stored.record.actionability.actionability_type, stored.id
    )
}

async fn download_to_temp(bot: &Bot, file_id: &str, suffix: &str) -> Result<NamedTempFile> {
    let file = bot.get_file(file_id.to_string()).await?;

    let temp = tempfile::Builder::new()
        .prefix("second_brain_")
        .suffix(suffix)
        .tempfile()?;

    let mut dst = tokio::fs::File::create(temp.path()).await?;
    bot.download_file(&file.path, &mut dst).await?;

    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::record::sample_record;
    use uuid::Uuid;

    #[test]
    fn test_confirmation_echoes_title_action_and_id() {
        let stored = StoredKnowledge {
            id: Uuid::nil(),
            record: sample_record(),
        };

        let text = confirmation(&stored);
        assert!(text.contains("Weekly report reminder"));
        assert!(text.contains("Actionable Task"));
        assert!(text.contains(&Uuid::nil().to_string()));
    }
}
