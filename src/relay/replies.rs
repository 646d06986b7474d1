//! Fixed user-facing texts sent by the relay.

pub const GREETING: &str = "Привіт!\nЯ ваш простий AI-асистент. Я можу пам'ятати наші останні повідомлення. Надішліть мені повідомлення, щоб почати, або використайте /clear, щоб скинути нашу розмову.";

pub const HISTORY_CLEARED: &str = "Вашу історію розмов було очищено.";

pub const NOTHING_TO_CLEAR: &str = "У вас немає історії розмов для очищення.";

pub const TEXT_ONLY: &str = "Будь ласка, надішліть текстове повідомлення.";
