pub mod simulated;
pub mod telegram;

pub use simulated::{
    SessionStats, SimWorld, SimulatedGateway, SimulatedTelegram, VERIFICATION_CODE,
};
pub use telegram::{
    ApiCredentials, CodeHandle, GroupHandle, PhoneContact, ResolvedUser, TelegramApi,
    TelegramGateway, TelegramResult, UploadedPhoto, UserRef,
};
