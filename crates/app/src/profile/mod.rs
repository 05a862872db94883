pub mod state;
pub mod view;

pub use state::{
    AVATAR_COUNT, AvatarOption, DEFAULT_AVATAR_STYLE, LocalProfile, ProfileDraft,
    ProfileRejection, avatar_gallery, avatar_url,
};
pub use view::ProfileSetupView;
