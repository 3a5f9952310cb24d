//! Audio recognition from uploaded files and voice messages.

use crate::bot::handlers::{get_user_id_safe, send_error, send_relay_error, send_track};
use crate::config::BotSettings;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use teloxide::{net::Download, prelude::*, types::FileMeta};
use tracing::{info, warn};
use tunebot_core::i18n::{self, ErrorText, Language, LanguagePreferences};
use tunebot_core::relay::Relay;
use tunebot_core::utils::file_extension;

/// Extensions accepted for recognition.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "m4a", "flac"];

/// An audio attachment found in a message.
#[derive(Debug, Clone)]
pub struct AudioUpload<'a> {
    /// Telegram file handle
    pub file: &'a FileMeta,
    /// Name sent to the recognizer, decides the format check
    pub file_name: String,
}

/// Find the audio attachment of `msg`: an audio file, a voice note or a
/// document.
#[must_use]
pub fn extract_upload(msg: &Message) -> Option<AudioUpload<'_>> {
    if let Some(audio) = msg.audio() {
        return Some(AudioUpload {
            file: &audio.file,
            file_name: audio
                .file_name
                .clone()
                .unwrap_or_else(|| "audio.mp3".to_string()),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(AudioUpload {
            file: &voice.file,
            file_name: "voice.ogg".to_string(),
        });
    }
    msg.document().map(|doc| AudioUpload {
        file: &doc.file,
        file_name: doc.file_name.clone().unwrap_or_default(),
    })
}

/// Format and size checks. Runs before the admission gate so a rejected
/// upload never costs the user quota.
///
/// # Errors
///
/// Returns the failure category to report to the user.
pub fn validate_upload(file_name: &str, size: u64, max_size: u64) -> Result<(), ErrorText> {
    let supported = file_extension(file_name)
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
    if !supported {
        return Err(ErrorText::UnsupportedFormat);
    }
    if size > max_size {
        return Err(ErrorText::FileTooLarge);
    }
    Ok(())
}

async fn download(bot: &Bot, file: &FileMeta) -> Result<Vec<u8>> {
    let file = bot.get_file(file.id.clone()).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf)
}

/// Audio, voice and document handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn handle_audio(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let lang = prefs.get(user_id).await;
    let Some(upload) = extract_upload(&msg) else {
        return Ok(());
    };

    let size = u64::from(upload.file.size);
    if let Err(kind) = validate_upload(
        &upload.file_name,
        size,
        settings.telegram.max_audio_file_size,
    ) {
        info!(
            "Rejected upload {} ({} bytes) from user {user_id}: {kind:?}",
            upload.file_name, size
        );
        return send_error(&bot, msg.chat.id, lang, kind, &settings).await;
    }

    // Cheap pre-check to skip the download; the relay makes the real decision.
    if relay.gate().is_enabled() && relay.gate().remaining(&user_id, Instant::now()) == 0 {
        return send_error(&bot, msg.chat.id, lang, ErrorText::RateLimited, &settings).await;
    }

    let processing = bot
        .send_message(msg.chat.id, i18n::processing_text(lang))
        .await?;

    let outcome = recognize(&bot, &msg, &upload, &relay, lang, &settings).await;

    if let Err(e) = bot.delete_message(msg.chat.id, processing.id).await {
        warn!("Failed to delete processing message: {e}");
    }
    outcome
}

async fn recognize(
    bot: &Bot,
    msg: &Message,
    upload: &AudioUpload<'_>,
    relay: &Relay,
    lang: Language,
    settings: &BotSettings,
) -> Result<()> {
    let user_id = get_user_id_safe(msg);

    let audio = match download(bot, upload.file).await {
        Ok(audio) => audio,
        Err(e) => {
            warn!("Failed to download {} for user {user_id}: {e}", upload.file_name);
            return send_error(bot, msg.chat.id, lang, ErrorText::ApiError, settings).await;
        }
    };

    match relay.recognize(user_id, audio, &upload.file_name).await {
        Ok(Some(track)) => {
            info!(
                "Recognized '{} - {}' for user {user_id}",
                track.artist, track.title
            );
            send_track(bot, msg.chat.id, &track, lang, settings).await
        }
        Ok(None) => {
            send_error(
                bot,
                msg.chat.id,
                lang,
                ErrorText::AudioRecognitionFailed,
                settings,
            )
            .await
        }
        Err(e) => send_relay_error(bot, msg.chat.id, lang, &e, settings).await,
    }
}
