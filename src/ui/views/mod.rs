mod catalog;
mod dream_detail;
mod home;
mod journal;
mod login;
mod profile;
mod result;
mod symbol;

pub use catalog::CatalogView;
pub use dream_detail::DreamDetailView;
pub use home::HomeView;
pub use journal::JournalView;
pub use login::LoginView;
pub use profile::ProfileView;
pub use result::DreamResultView;
pub use symbol::SymbolView;

use crate::api::types::User;
use crate::navigation::Route;
use crate::query::Query;
use crate::ui::view::{Context, View};

/// Build the view for a route.
pub fn open(route: Route, ctx: &Context) -> Box<dyn View> {
  match route {
    Route::Home => Box::new(HomeView::new(ctx.clone())),
    Route::Journal => Box::new(JournalView::new(ctx.clone())),
    Route::Dream(id) => Box::new(DreamDetailView::new(ctx.clone(), id)),
    Route::Result => Box::new(DreamResultView::new(ctx.clone())),
    Route::Catalog => Box::new(CatalogView::new()),
    Route::Symbol(slug) => Box::new(SymbolView::new(slug)),
    Route::Profile => Box::new(ProfileView::new(ctx.clone())),
    Route::Login(redirect) => Box::new(LoginView::new(ctx.clone(), redirect)),
  }
}

/// Enable the current-user query exactly while a token is held, so a
/// signed-out session never asks for `/users/me`.
pub fn follow_session(user: &mut Query<User>, ctx: &Context) {
  let signed_in = ctx.auth.is_authenticated();
  if signed_in != user.is_enabled() {
    user.set_enabled(signed_in);
    if signed_in {
      user.fetch();
    }
  }
}
