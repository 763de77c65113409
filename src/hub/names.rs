//! Display-name generation.

use rand::Rng;
use rand::seq::SliceRandom;

const ADJECTIVES: &[&str] = &[
    "Amber", "Bold", "Calm", "Dusky", "Eager", "Fleet", "Gentle", "Hardy",
    "Jolly", "Lucky", "Mellow", "Nimble", "Plucky", "Quiet", "Rapid", "Sly",
    "Sunny", "Tidy", "Witty", "Zesty",
];

const ANIMALS: &[&str] = &[
    "Alpaca", "Bison", "Crane", "Dingo", "Ferret", "Gecko", "Heron", "Ibex",
    "Jackal", "Koala", "Lemur", "Marten", "Newt", "Ocelot", "Puffin", "Quokka",
    "Raven", "Stoat", "Tapir", "Walrus",
];

/// Random `AdjectiveAnimalNNN` display name.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Anonymous");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("Player");
    let number: u16 = rng.gen_range(0..1000);
    format!("{adjective}{animal}{number}")
}
