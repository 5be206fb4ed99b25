// Risk accounting engine
//
// Holds the order book and the per-instrument aggregates, and makes the
// accept/reject decision for new and modify orders against the
// configured worst-case position limits. The engine performs no I/O;
// handlers return data and the service loop does the talking.

use crate::protocol::{
    DeleteOrder, ModifyOrderQuantity, NewOrder, OrderResponse, OrderStatus, Trade,
};
use common::{ListingId, OrderId, Qty, Side};
use std::collections::HashMap;

/// Maximum worst-case positions, immutable for the service lifetime.
///
/// Limits are sourced from signed command line arguments, so they never
/// exceed `i64::MAX`; together with invariant checks on every accept
/// this keeps the aggregates within signed range.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    /// Cap on the worst-case long position per instrument.
    pub max_buy_pos: Qty,
    /// Cap on the worst-case short position per instrument.
    pub max_sell_pos: Qty,
}

impl RiskLimits {
    pub fn new(max_buy_pos: Qty, max_sell_pos: Qty) -> Self {
        Self {
            max_buy_pos,
            max_sell_pos,
        }
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_buy_pos: 10_000,
            max_sell_pos: 10_000,
        }
    }
}

/// One live order in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub listing_id: ListingId,
    pub quantity: Qty,
    pub side: Side,
}

/// Per-instrument position aggregates.
///
/// `buy_qty` and `sell_qty` are the sums of live order quantities per
/// side; `net_pos` is the cumulative traded position, positive long.
/// Entries are created on first touch and never removed; all-zero is a
/// valid state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentState {
    pub net_pos: i64,
    pub buy_qty: Qty,
    pub sell_qty: Qty,
}

impl InstrumentState {
    /// Position reached if every resting buy filled and no sell did.
    #[inline]
    pub fn worst_buy_pos(&self) -> i64 {
        let qty = self.buy_qty as i64;
        qty.max(self.net_pos + qty)
    }

    /// Position reached if every resting sell filled and no buy did.
    #[inline]
    pub fn worst_sell_pos(&self) -> i64 {
        let qty = self.sell_qty as i64;
        qty.max(qty - self.net_pos)
    }
}

/// The risk gate's accounting engine.
///
/// Owns the order book (keyed by order id) and the instrument states
/// (keyed by listing id). Neither map holds a reference into the other;
/// trade handling looks the order up by id to read its side.
pub struct RiskEngine {
    limits: RiskLimits,
    orders: HashMap<OrderId, Order>,
    instruments: HashMap<ListingId, InstrumentState>,
}

impl RiskEngine {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            orders: HashMap::new(),
            instruments: HashMap::new(),
        }
    }

    /// Handles a NewOrder request.
    ///
    /// Rejected without mutation when the side byte is invalid, the
    /// order id is already live, or the order would push the worst-case
    /// position for its side past the limit. Accepting inserts the order
    /// and bumps the side aggregate. The price is not consulted.
    pub fn handle_new_order(&mut self, msg: &NewOrder) -> OrderResponse {
        let mut response = OrderResponse {
            order_id: msg.order_id,
            status: OrderStatus::Rejected,
        };

        let Some(side) = Side::from_byte(msg.side) else {
            return response;
        };

        // A live id must keep its original quantity counted exactly once.
        if self.orders.contains_key(&msg.order_id) {
            return response;
        }

        let state = self.instruments.entry(msg.listing_id).or_default();
        let accepted = match side {
            Side::Buy => fits_limit(msg.quantity, state.worst_buy_pos(), self.limits.max_buy_pos),
            Side::Sell => fits_limit(msg.quantity, state.worst_sell_pos(), self.limits.max_sell_pos),
        };

        if accepted {
            match side {
                Side::Buy => state.buy_qty += msg.quantity,
                Side::Sell => state.sell_qty += msg.quantity,
            }
            self.orders.insert(
                msg.order_id,
                Order {
                    listing_id: msg.listing_id,
                    quantity: msg.quantity,
                    side,
                },
            );
            response.status = OrderStatus::Accepted;
        }

        response
    }

    /// Handles a ModifyOrderQuantity request.
    ///
    /// Rejected without mutation when the order id is unknown or the
    /// signed quantity delta would breach the limit for the order's
    /// side. Decreases always fit. Side and listing are immutable.
    pub fn handle_modify_order(&mut self, msg: &ModifyOrderQuantity) -> OrderResponse {
        let mut response = OrderResponse {
            order_id: msg.order_id,
            status: OrderStatus::Rejected,
        };

        let Some(order) = self.orders.get_mut(&msg.order_id) else {
            return response;
        };

        let state = self.instruments.entry(order.listing_id).or_default();
        // Widening keeps the delta exact for full-range quantities.
        let delta = msg.new_quantity as i128 - order.quantity as i128;
        let (worst, max_pos) = match order.side {
            Side::Buy => (state.worst_buy_pos(), self.limits.max_buy_pos),
            Side::Sell => (state.worst_sell_pos(), self.limits.max_sell_pos),
        };

        if delta + worst as i128 <= max_pos as i128 {
            // The aggregate bounds the live order quantity from below, so
            // applying the delta cannot underflow.
            match order.side {
                Side::Buy => state.buy_qty = (state.buy_qty as i128 + delta) as Qty,
                Side::Sell => state.sell_qty = (state.sell_qty as i128 + delta) as Qty,
            }
            order.quantity = msg.new_quantity;
            response.status = OrderStatus::Accepted;
        }

        response
    }

    /// Handles a DeleteOrder request. Unknown ids are a no-op.
    pub fn handle_delete_order(&mut self, msg: &DeleteOrder) {
        let Some(order) = self.orders.remove(&msg.order_id) else {
            return;
        };
        let state = self.instruments.entry(order.listing_id).or_default();
        match order.side {
            Side::Buy => state.buy_qty -= order.quantity,
            Side::Sell => state.sell_qty -= order.quantity,
        }
    }

    /// Handles a trade notification.
    ///
    /// A filled buy consumes long capacity already counted in `buy_qty`,
    /// so the net position moves down; a filled sell moves it up. The
    /// aggregates and the book entry are untouched; the client follows
    /// up with a Delete or Modify. Returns `false` when the trade id
    /// does not name a live order, in which case nothing changes beyond
    /// touching the instrument entry.
    pub fn handle_trade(&mut self, msg: &Trade) -> bool {
        let state = self.instruments.entry(msg.listing_id).or_default();
        let Some(order) = self.orders.get(&msg.trade_id) else {
            return false;
        };
        match order.side {
            Side::Buy => state.net_pos = state.net_pos.saturating_sub_unsigned(msg.quantity),
            Side::Sell => state.net_pos = state.net_pos.saturating_add_unsigned(msg.quantity),
        }
        true
    }

    /// The configured limits.
    #[inline]
    pub fn limits(&self) -> RiskLimits {
        self.limits
    }

    /// Looks up a live order by id.
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Looks up the state of an instrument that has been touched.
    pub fn instrument(&self, listing_id: ListingId) -> Option<&InstrumentState> {
        self.instruments.get(&listing_id)
    }

    /// Iterates over all live orders.
    pub fn orders(&self) -> impl Iterator<Item = (&OrderId, &Order)> {
        self.orders.iter()
    }

    /// Number of live orders in the book.
    #[inline]
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Renders the full engine state for the log, sorted by id so
    /// consecutive dumps are comparable.
    pub fn dump_state(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(&format!(
            "max buy position: {}\nmax sell position: {}\n",
            self.limits.max_buy_pos, self.limits.max_sell_pos
        ));

        out.push_str("orders:\n");
        let mut order_ids: Vec<_> = self.orders.keys().copied().collect();
        order_ids.sort_unstable();
        for id in order_ids {
            let order = &self.orders[&id];
            out.push_str(&format!("  id: {id}\n"));
            out.push_str(&format!("    listing_id: {}\n", order.listing_id));
            out.push_str(&format!("    quantity: {}\n", order.quantity));
            out.push_str(&format!("    side: {}\n", order.side));
        }

        out.push_str("instrument state:\n");
        let mut listing_ids: Vec<_> = self.instruments.keys().copied().collect();
        listing_ids.sort_unstable();
        for id in listing_ids {
            let state = &self.instruments[&id];
            out.push_str(&format!("  id: {id}\n"));
            out.push_str(&format!("    net_pos: {}\n", state.net_pos));
            out.push_str(&format!("    buy_qty: {}\n", state.buy_qty));
            out.push_str(&format!("    sell_qty: {}\n", state.sell_qty));
            out.push_str(&format!("    worst_buy_pos: {}\n", state.worst_buy_pos()));
            out.push_str(&format!("    worst_sell_pos: {}\n", state.worst_sell_pos()));
        }

        out
    }
}

/// The worst-case exposure check shared by buys and sells.
///
/// Widened so the comparison stays exact for full-range quantities; the
/// worst-case position is never negative because both of its candidates
/// are bounded below by the resting quantity.
#[inline]
fn fits_limit(quantity: Qty, worst_pos: i64, max_pos: Qty) -> bool {
    quantity as i128 + worst_pos as i128 <= max_pos as i128
}
