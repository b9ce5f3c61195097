mod period_state;
