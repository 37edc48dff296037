use crate::mpris::MprisHandle;
use crate::session::SessionController;

/// Position is not signalled over D-Bus, so the loop refreshes it every tick.
pub fn update_mpris(mpris: &MprisHandle, session: &SessionController) {
    mpris.set_position(session.position());
}
