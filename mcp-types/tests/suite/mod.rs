mod initialize;
mod progress_notification;
