//! Lock helpers shared by the queue and the oscillator.

use std::sync::LockResult;

//Take the guard out of a LockResult even if some other holder panicked.
//
//Everything behind these locks is changed in a single step (one push, one pop, one swap of the
//oscillator's lifecycle), so a panic in another holder can't leave it half-written. Refusing to
//hand out the lock after that would only turn one panicked thread into a hang for everyone else.
pub fn recover<T>(res: LockResult<T>) -> T {
    match res {
        Ok(guard) => guard,
        Err(poison) => {
            log::warn!("recovering poisoned lock");
            poison.into_inner()
        }
    }
}
